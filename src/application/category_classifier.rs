//! Category classification pass
//!
//! Names are matched against the category tokens first, in precedence order.
//! Only names without a token go to the image classifier, whose answer is
//! accepted when it is exactly one of the tokens and otherwise becomes
//! [`Category::Low`].

#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::domain::errors::CatalogResult;
use crate::domain::product::Category;
use crate::domain::repositories::ProductRepository;
use crate::domain::services::ImageClassifier;

/// Category used for unrecognized classifier output
pub const DEFAULT_CATEGORY: Category = Category::Low;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    Keyword,
    Vision,
    /// Classifier output (or a missing image) fell back to the default
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub source: ClassificationSource,
}

/// First category token contained in the case-folded name
pub fn match_keyword(name: &str) -> Option<Category> {
    let name = name.to_lowercase();
    Category::ALL
        .into_iter()
        .find(|category| name.contains(category.as_str()))
}

/// Exact token after trim and lowercase, else the default
pub fn coerce_classifier_output(output: &str) -> Classification {
    match output.parse::<Category>() {
        Ok(category) => Classification {
            category,
            source: ClassificationSource::Vision,
        },
        Err(_) => Classification {
            category: DEFAULT_CATEGORY,
            source: ClassificationSource::Default,
        },
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClassificationSummary {
    pub examined: usize,
    pub by_keyword: usize,
    pub by_vision: usize,
    pub defaulted: usize,
    /// Rows left untouched because the classifier or the store failed
    pub failed: usize,
    pub cancelled: bool,
}

pub struct CategoryClassifier {
    image_classifier: Arc<dyn ImageClassifier>,
}

impl CategoryClassifier {
    pub fn new(image_classifier: Arc<dyn ImageClassifier>) -> Self {
        Self { image_classifier }
    }

    /// Resolve one record's category.
    ///
    /// Errors only when the image classifier itself cannot be reached.
    pub async fn classify(&self, name: &str, image_url: Option<&str>) -> CatalogResult<Classification> {
        if let Some(category) = match_keyword(name) {
            return Ok(Classification {
                category,
                source: ClassificationSource::Keyword,
            });
        }

        let Some(image_url) = image_url else {
            debug!("No image for '{}', using default category", name);
            return Ok(Classification {
                category: DEFAULT_CATEGORY,
                source: ClassificationSource::Default,
            });
        };

        let vocabulary = Category::vocabulary();
        let output = self
            .image_classifier
            .classify_image(image_url, &vocabulary)
            .await?;
        let classification = coerce_classifier_output(&output);
        if classification.source == ClassificationSource::Default {
            warn!(
                "Unrecognized classifier output '{}' for '{}', using {}",
                output.trim(),
                name,
                DEFAULT_CATEGORY
            );
        }
        Ok(classification)
    }

    /// Classify stored rows and write each category back
    pub async fn classify_store(
        &self,
        repository: &dyn ProductRepository,
        only_unclassified: bool,
        cancel: &CancellationToken,
    ) -> anyhow::Result<ClassificationSummary> {
        let span = info_span!("classify", only_unclassified);
        async move {
            let candidates = repository.list_for_classification(only_unclassified).await?;
            info!("Classifying {} products", candidates.len());

            let mut summary = ClassificationSummary::default();
            for candidate in candidates {
                if cancel.is_cancelled() {
                    info!("Classification cancelled");
                    summary.cancelled = true;
                    break;
                }
                summary.examined += 1;

                let classification = match self.classify(&candidate.name, candidate.image_url.as_deref()).await {
                    Ok(classification) => classification,
                    Err(e) => {
                        warn!(id = %candidate.id, "Leaving category unchanged: {}", e);
                        summary.failed += 1;
                        continue;
                    }
                };

                if let Err(e) = repository.set_category(&candidate.id, classification.category).await {
                    warn!(id = %candidate.id, "Failed to store category: {}", e);
                    summary.failed += 1;
                    continue;
                }

                debug!(
                    id = %candidate.id,
                    "Classified as {} ({:?})",
                    classification.category,
                    classification.source
                );
                match classification.source {
                    ClassificationSource::Keyword => summary.by_keyword += 1,
                    ClassificationSource::Vision => summary.by_vision += 1,
                    ClassificationSource::Default => summary.defaulted += 1,
                }
            }

            info!(
                "Classification finished: {} examined, {} by keyword, {} by image, {} defaulted, {} failed",
                summary.examined, summary.by_keyword, summary.by_vision, summary.defaulted, summary.failed
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }
}
