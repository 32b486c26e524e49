/// A captured request: one header value and one body value.
///
/// Both fields are set at construction and never mutated. A request is
/// consumed exactly once by a serializer; nothing retains it afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request<H, B> {
    header: H,
    body: B,
}

impl<H, B> Request<H, B> {
    /// Create a request from its header and body.
    pub fn new(header: H, body: B) -> Self {
        Self { header, body }
    }

    /// The header representation.
    pub fn header(&self) -> &H {
        &self.header
    }

    /// The body representation.
    pub fn body(&self) -> &B {
        &self.body
    }

    /// Split into `(header, body)`.
    pub fn into_parts(self) -> (H, B) {
        (self.header, self.body)
    }

    /// Replace the body, keeping the header.
    pub fn map_body<C>(self, f: impl FnOnce(B) -> C) -> Request<H, C> {
        Request {
            header: self.header,
            body: f(self.body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_return_construction_values() {
        let q = Request::new("h", vec![1u8, 2, 3]);
        assert_eq!(*q.header(), "h");
        assert_eq!(q.body(), &vec![1, 2, 3]);
    }

    #[test]
    fn into_parts_moves_both_fields() {
        let (h, b) = Request::new(7u8, String::from("body")).into_parts();
        assert_eq!(h, 7);
        assert_eq!(b, "body");
    }

    #[test]
    fn map_body_keeps_header() {
        let q = Request::new("ct", "abc").map_body(|b| b.len());
        assert_eq!(*q.header(), "ct");
        assert_eq!(*q.body(), 3);
    }
}
