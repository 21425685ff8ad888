//! Email rendering with embedded tera templates

use serde::Serialize;
use tera::{Context, Tera};

use crate::domain::error::WorkerError;

const REMINDER_TEMPLATE: &str = r#"<html>
<body>
  <h2>Reminder{% if title %}: {{ title }}{% endif %}</h2>
  {% if message %}<p>{{ message }}</p>{% endif %}
  <p><small>Schedule: {{ spec }}</small></p>
</body>
</html>
"#;

const DIGEST_TEMPLATE: &str = r#"<html>
<body>
  <h2>Your unread links this week</h2>
  <ul>
  {% for entry in entries %}
    <li>
      <a href="{{ entry.url }}">{{ entry.title }}</a><br/>
      <small>{{ entry.source }} &middot; {{ entry.date }}</small>
    </li>
  {% endfor %}
  </ul>
</body>
</html>
"#;

/// One line of the unread digest
#[derive(Debug, Clone, Serialize)]
pub struct DigestEntry {
    pub title:  String,
    pub url:    String,
    pub source: String,
    pub date:   String
}

pub struct TemplateRenderer {
    tera: Tera
}

impl TemplateRenderer {
    pub fn new() -> Result<Self, WorkerError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![("reminder.html", REMINDER_TEMPLATE), ("digest.html", DIGEST_TEMPLATE)])?;
        Ok(Self { tera })
    }

    pub fn render_reminder(
        &self,
        title: Option<&str>,
        spec: &str,
        message: Option<&str>
    ) -> Result<String, WorkerError> {
        let mut context = Context::new();
        context.insert("title", &title);
        context.insert("spec", spec);
        context.insert("message", &message);
        Ok(self.tera.render("reminder.html", &context)?)
    }

    pub fn render_digest(&self, entries: &[DigestEntry]) -> Result<String, WorkerError> {
        let mut context = Context::new();
        context.insert("entries", entries);
        Ok(self.tera.render("digest.html", &context)?)
    }
}
