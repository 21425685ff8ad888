use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::domain::{
    error::WorkerError,
    link::Properties,
    resource::{GeneratedResource, ResourceType, SuggestResponse}
};

/// One scraping strategy bound to a single URL
///
/// Callers must invoke [`Scraper::close`] once they are done, whether or not
/// any earlier step failed.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Open the page; failure here means the URL is unreachable
    async fn init(&mut self) -> Result<(), WorkerError>;

    /// Produce the requested resources into temporary storage
    async fn scrape_resources(
        &mut self,
        resource_set: &BTreeSet<ResourceType>
    ) -> Result<Vec<GeneratedResource>, WorkerError>;

    /// Light scrape used for previews before a link is saved
    async fn suggest(&mut self, resource_set: &BTreeSet<ResourceType>) -> Result<SuggestResponse, WorkerError>;

    /// Attach follow-up tasks and metadata to the link's properties
    async fn enrich(&mut self, props: &mut Properties) -> Result<(), WorkerError> {
        props.add_task("Process Link", "link.process");
        props.add_task("Find Discussions", "link.discussions");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), WorkerError>;
}

/// Builds the scraping strategies that apply to a URL
pub trait ScraperFactory: Send + Sync {
    fn create_processors(&self, url: &str) -> Vec<Box<dyn Scraper>>;
}
