use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Sent in place of an empty model answer so a request never goes unanswered.
pub const EMPTY_RESPONSE_NOTICE: &str = "**No response was generated.**";

/// Somewhere a single message can be posted, e.g. a Discord channel.
#[async_trait]
pub trait Destination: Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn send(&self, content: &str) -> Result<(), Self::Error>;
}

#[derive(Debug, Error)]
pub enum DeliveryError<E> {
    #[error("label of {prefix_len} chars leaves no room in a {budget}-char message")]
    PrefixTooLong { prefix_len: usize, budget: usize },
    #[error(transparent)]
    Send(E),
}

/// Splits `text` by character position: the first slice holds at most
/// `first_capacity` chars, every later slice at most `capacity`.
///
/// Slices borrow from `text` and always land on char boundaries. An empty
/// `text` yields no slices; both capacities must be non-zero.
pub fn split_chunks(text: &str, first_capacity: usize, capacity: usize) -> Vec<&str> {
    debug_assert!(first_capacity > 0 && capacity > 0);

    let mut chunks = Vec::new();
    let mut rest = text;
    let mut limit = first_capacity;

    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(limit)
            .map_or(rest.len(), |(idx, _)| idx);
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
        limit = capacity;
    }

    chunks
}

/// Posts `text` to `destination` in as many messages as `budget` requires.
///
/// Only the first message carries `prefix`, and its length counts against
/// that message. Messages go out one at a time, in order; the first failing
/// send stops the dispatch. Returns the number of messages sent.
pub async fn send_long_message<D: Destination>(
    destination: &D,
    prefix: &str,
    text: &str,
    budget: usize,
) -> Result<usize, DeliveryError<D::Error>> {
    let prefix_len = prefix.chars().count();
    if prefix_len >= budget {
        return Err(DeliveryError::PrefixTooLong { prefix_len, budget });
    }

    if text.is_empty() {
        send_logged(destination, EMPTY_RESPONSE_NOTICE).await?;
        return Ok(1);
    }

    let chunks = split_chunks(text, budget - prefix_len, budget);
    let mut sent = 0;
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            send_logged(destination, &format!("{prefix}{chunk}")).await?;
        } else {
            send_logged(destination, chunk).await?;
        }
        sent += 1;
    }

    Ok(sent)
}

async fn send_logged<D: Destination>(
    destination: &D,
    content: &str,
) -> Result<(), DeliveryError<D::Error>> {
    debug!("Bot sending: {}", content);
    destination.send(content).await.map_err(DeliveryError::Send)
}
