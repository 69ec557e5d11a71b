//! Pipeline envelope (spec. 3): the unit that flows from producer through
//! workers to the unshuffler. `index` is the sole ordering key.

#[derive(Clone, Debug)]
pub struct Envelope<T> {
    pub index: u64,
    pub ident: String,
    pub payload: Option<T>,
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn empty(index: u64) -> Envelope<T> {
        Envelope { index, ident: String::new(), payload: None, error: None }
    }

    pub fn ok(index: u64, ident: String, payload: T) -> Envelope<T> {
        Envelope { index, ident, payload: Some(payload), error: None }
    }

    pub fn failed(index: u64, ident: String, error: String) -> Envelope<T> {
        Envelope { index, ident, payload: None, error: Some(error) }
    }

    pub fn is_skipped(&self) -> bool {
        self.payload.is_none() && self.error.is_none()
    }
}
