use futures::stream::{self, StreamExt, TryStreamExt};
use log::debug;

use super::{SentimentScore, SentimentScorer};
use crate::{Error, Result};

/// Score `texts` in batches of `batch_size`, running up to `concurrency`
/// batches at a time. Output order always matches input order.
pub async fn score_texts<S>(
    scorer: &S,
    texts: &[String],
    batch_size: usize,
    concurrency: usize,
) -> Result<Vec<SentimentScore>>
where
    S: SentimentScorer + ?Sized,
{
    if batch_size == 0 {
        return Err(Error::InvalidArgument("batch_size must be > 0".into()));
    }
    let n_batches = (texts.len() + batch_size - 1) / batch_size;
    debug!(
        "scoring {} texts with {} in {} batches (concurrency {})",
        texts.len(),
        scorer.name(),
        n_batches,
        concurrency.max(1)
    );

    let batches: Vec<Vec<SentimentScore>> = stream::iter(texts.chunks(batch_size).enumerate())
        .map(|(idx, batch)| async move {
            let scores = scorer.score_batch(batch).await?;
            if scores.len() != batch.len() {
                return Err(Error::ScorerError(format!(
                    "batch {} returned {} scores for {} texts",
                    idx,
                    scores.len(),
                    batch.len()
                )));
            }
            Ok::<_, Error>(scores)
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    Ok(batches.into_iter().flatten().collect())
}
