use std::pin::Pin;

use futures::Stream;

use crate::errors::GatewayError;

/// One incremental piece of generated text. May be empty (e.g. a chunk that
/// only carries a finish reason or usage metadata).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
}

impl Fragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Lazy, finite sequence of fragments. An `Err` item is a mid-stream failure;
/// consumers stop at the first one.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, GatewayError>> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn empty_fragment() {
        assert!(Fragment::default().is_empty());
        assert!(!Fragment::new("x").is_empty());
    }

    #[tokio::test]
    async fn boxed_stream_yields_in_order() {
        let items = vec![Ok(Fragment::new("a")), Ok(Fragment::new("b"))];
        let mut stream: FragmentStream = Box::pin(futures::stream::iter(items));

        let mut texts = Vec::new();
        while let Some(item) = stream.next().await {
            texts.push(item.unwrap().text);
        }
        assert_eq!(texts, vec!["a", "b"]);
    }
}
