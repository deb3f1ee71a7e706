/// A single byte range taken from an HTTP `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=start-end`, both inclusive
    Bounded { start: u64, end: u64 },
    /// `bytes=start-`
    From { start: u64 },
    /// `bytes=-length`
    Suffix { length: u64 },
}

impl ByteRange {
    /// Parse a `Range` header value.
    ///
    /// Returns `None` for anything other than one well-formed byte range, in which case the
    /// caller serves the whole object.
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.trim().strip_prefix("bytes=")?.trim();
        if spec.contains(',') {
            return None;
        }

        let (start, end) = spec.split_once('-')?;
        let (start, end) = (start.trim(), end.trim());

        match (start.is_empty(), end.is_empty()) {
            (true, true) => None,
            (true, false) => Some(Self::Suffix {
                length: end.parse().ok()?,
            }),
            (false, true) => Some(Self::From {
                start: start.parse().ok()?,
            }),
            (false, false) => {
                let start = start.parse().ok()?;
                let end = end.parse().ok()?;
                (start <= end).then_some(Self::Bounded { start, end })
            }
        }
    }

    /// Resolve against an object of `size` bytes into an inclusive `(first, last)` pair.
    ///
    /// Returns `None` when no byte of the object falls in the range.
    pub fn resolve(self, size: u64) -> Option<(u64, u64)> {
        let last = size.checked_sub(1)?;

        match self {
            Self::Bounded { start, end } => (start <= last).then(|| (start, end.min(last))),
            Self::From { start } => (start <= last).then_some((start, last)),
            Self::Suffix { length: 0 } => None,
            Self::Suffix { length } => Some((size.saturating_sub(length), last)),
        }
    }
}

pub fn content_range(first: u64, last: u64, size: u64) -> String {
    format!("bytes {first}-{last}/{size}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bounded_range() {
        assert_eq!(
            ByteRange::parse("bytes=0-99"),
            Some(ByteRange::Bounded { start: 0, end: 99 })
        );
    }

    #[test]
    fn parse_open_ended_range() {
        assert_eq!(ByteRange::parse("bytes=100-"), Some(ByteRange::From { start: 100 }));
    }

    #[test]
    fn parse_suffix_range() {
        assert_eq!(ByteRange::parse("bytes=-50"), Some(ByteRange::Suffix { length: 50 }));
    }

    #[test]
    fn ignore_unsupported_headers() {
        assert_eq!(ByteRange::parse("bytes=0-1,5-9"), None);
        assert_eq!(ByteRange::parse("items=0-1"), None);
        assert_eq!(ByteRange::parse("bytes=-"), None);
        assert_eq!(ByteRange::parse("bytes=9-3"), None);
        assert_eq!(ByteRange::parse("bytes=a-b"), None);
    }

    #[test]
    fn resolve_clamps_to_the_object() {
        let range = ByteRange::Bounded { start: 10, end: 500 };
        assert_eq!(range.resolve(100), Some((10, 99)));
    }

    #[test]
    fn resolve_suffix_longer_than_object() {
        let range = ByteRange::Suffix { length: 500 };
        assert_eq!(range.resolve(100), Some((0, 99)));
    }

    #[test]
    fn resolve_unsatisfiable_ranges() {
        assert_eq!(ByteRange::From { start: 100 }.resolve(100), None);
        assert_eq!(ByteRange::Suffix { length: 0 }.resolve(100), None);
        assert_eq!(ByteRange::From { start: 0 }.resolve(0), None);
    }

    #[test]
    fn format_content_range() {
        assert_eq!(content_range(0, 99, 1000), "bytes 0-99/1000");
    }
}
