//! Plain-text cleanup applied to extracted page content before indexing

use std::{collections::HashSet, sync::LazyLock};

const ENTITIES: [(&str, &str); 12] = [
    ("\u{2014}", "-"),
    ("\u{2013}", "-"),
    ("&mdash;", "-"),
    ("&ndash;", "-"),
    ("\u{00A0}", " "),
    ("&nbsp;", " "),
    ("\u{00AB}", "\""),
    ("\u{00BB}", "\""),
    ("&quot;", "\""),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">")
];

const STOPWORDS: &str = "a about above after again against all am an and any are as at be because been before being \
                         below between both but by can could did do does doing down during each few for from further \
                         had has have having he her here hers herself him himself his how i if in into is it its \
                         itself just me more most my myself no nor not now of off on once only or other our ours \
                         ourselves out over own same she should so some such than that the their theirs them \
                         themselves then there these they this those through to too under until up very was we \
                         were what when where which while who whom why will with would you your yours yourself \
                         yourselves";

static STOPWORD_SET: LazyLock<HashSet<&'static str>> = LazyLock::new(|| STOPWORDS.split_whitespace().collect());

/// Collapse whitespace runs and replace common typographic entities
pub fn normalize(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let replaced = ENTITIES.iter().fold(collapsed, |acc, (from, to)| acc.replace(from, to));
    replaced.trim().to_string()
}

/// Lowercase and drop common English stop words
pub fn remove_stopwords(text: &str) -> String {
    text.to_lowercase().split(' ').filter(|word| !STOPWORD_SET.contains(word)).collect::<Vec<_>>().join(" ")
}
