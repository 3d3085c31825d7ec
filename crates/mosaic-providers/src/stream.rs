use mosaic_core::Usage;

/// One piece of a streamed provider response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Inline binary payload, still base64 encoded
    InlineData { mime: String, data: String },
    /// Text delta
    Text(String),
    /// Token accounting
    Usage(Usage),
}

/// Everything a drained stream produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drained {
    pub image: Option<(String, String)>,
    pub text: Option<String>,
    pub usage: Option<Usage>,
}

/// Folds a chunk stream into a single result
///
/// The first inline payload is kept and later ones are dropped. Text
/// deltas are concatenated in arrival order. The last usage chunk wins.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    image: Option<(String, String)>,
    text: String,
    usage: Option<Usage>,
    dropped_images: usize,
}

impl StreamAccumulator {
    pub fn push(&mut self, chunk: Chunk) {
        match chunk {
            Chunk::InlineData { mime, data } => {
                if self.image.is_none() {
                    self.image = Some((mime, data));
                } else {
                    self.dropped_images += 1;
                }
            }
            Chunk::Text(delta) => self.text.push_str(&delta),
            Chunk::Usage(usage) => self.usage = Some(usage),
        }
    }

    pub fn finish(self) -> Drained {
        if self.dropped_images > 0 {
            tracing::debug!(dropped = self.dropped_images, "ignored additional inline images");
        }

        let text = Some(self.text).filter(|t| !t.trim().is_empty());

        Drained {
            image: self.image,
            text,
            usage: self.usage,
        }
    }
}

impl Extend<Chunk> for StreamAccumulator {
    fn extend<I: IntoIterator<Item = Chunk>>(&mut self, iter: I) {
        for chunk in iter {
            self.push(chunk);
        }
    }
}
