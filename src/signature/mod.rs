//! File signature (magic number) sniffing.
//!
//! A [`Signature`] is the fixed sequence of leading bytes that identifies a
//! binary format, e.g. the 8-byte PNG header `89 50 4E 47 0D 0A 1A 0A`.
//!
//! # Consumption
//! Sniffing reads the source one byte at a time and stops at the first
//! mismatch, so no byte past the deciding one is consumed.  There is no seek
//! or rewind: checking again needs a fresh source positioned at the start.
//!
//! # Matcher states
//!
//! ```text
//! Scanning(0) --match--> Scanning(1) --match--> ... --last match--> Accepted
//!      |                      |
//!      +---mismatch / EOF-----+--------------------------------> Rejected
//! ```
//!
//! `Accepted` and `Rejected` are terminal.

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::Error;

// ── Well-known signatures ───────────────────────────────────────────────────

pub const PNG_MAGIC:  &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
pub const ZIP_MAGIC:  &[u8] = b"PK\x03\x04";
pub const GIF_MAGIC:  &[u8] = b"GIF8";
pub const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
pub const PDF_MAGIC:  &[u8] = b"%PDF-";

/// Formats with a built-in signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Png,
    Zip,
    Gif,
    Jpeg,
    Pdf,
}

impl Format {
    pub const ALL: [Format; 5] = [Format::Png, Format::Zip, Format::Gif, Format::Jpeg, Format::Pdf];

    pub fn magic(self) -> &'static [u8] {
        match self {
            Format::Png  => PNG_MAGIC,
            Format::Zip  => ZIP_MAGIC,
            Format::Gif  => GIF_MAGIC,
            Format::Jpeg => JPEG_MAGIC,
            Format::Pdf  => PDF_MAGIC,
        }
    }

    pub fn signature(self) -> Signature {
        Signature { name: Cow::Borrowed(self.name()), bytes: Cow::Borrowed(self.magic()) }
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Png  => "png",
            Format::Zip  => "zip",
            Format::Gif  => "gif",
            Format::Jpeg => "jpeg",
            Format::Pdf  => "pdf",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "png"          => Some(Format::Png),
            "zip"          => Some(Format::Zip),
            "gif"          => Some(Format::Gif),
            "jpeg" | "jpg" => Some(Format::Jpeg),
            "pdf"          => Some(Format::Pdf),
            _              => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::from_name(s).ok_or_else(|| Error::InvalidArgument(format!("unknown format '{s}'")))
    }
}

// ── Signature ────────────────────────────────────────────────────────────────

/// A named, non-empty sequence of expected leading bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    name:  Cow<'static, str>,
    bytes: Cow<'static, [u8]>,
}

impl Signature {
    /// Fails with `InvalidArgument` if `bytes` is empty.
    pub fn new(name: impl Into<Cow<'static, str>>, bytes: impl Into<Cow<'static, [u8]>>) -> Result<Self, Error> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(Error::InvalidArgument("signature must not be empty".into()));
        }
        Ok(Self { name: name.into(), bytes })
    }

    /// Parse a signature written as hex digits, e.g. `"89 50 4E 47"`.
    /// Whitespace between byte pairs is ignored.
    pub fn from_hex(name: impl Into<Cow<'static, str>>, hex_str: &str) -> Result<Self, Error> {
        let digits: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = hex::decode(&digits)
            .map_err(|e| Error::InvalidArgument(format!("bad signature hex '{hex_str}': {e}")))?;
        Self::new(name, bytes)
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn bytes(&self) -> &[u8] { &self.bytes }

    pub fn len(&self) -> usize { self.bytes.len() }

    /// Always `false`; construction rejects empty signatures.
    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }

    /// Upper-case, space separated hex (diagnostics only).
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ")
    }
}

impl From<Format> for Signature {
    fn from(f: Format) -> Self { f.signature() }
}

// ── Matcher ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    /// `n` leading bytes have matched so far.
    Scanning(usize),
    Accepted,
    Rejected,
}

impl MatchState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, MatchState::Scanning(_))
    }
}

/// Incremental matcher for one signature.  O(1) per byte.
#[derive(Debug, Clone)]
pub struct SignatureMatcher<'a> {
    signature: &'a Signature,
    state:     MatchState,
}

impl<'a> SignatureMatcher<'a> {
    pub fn new(signature: &'a Signature) -> Self {
        Self { signature, state: MatchState::Scanning(0) }
    }

    pub fn state(&self) -> MatchState { self.state }

    pub fn signature(&self) -> &'a Signature { self.signature }

    /// Advance by one byte.  No effect once terminal.
    pub fn feed(&mut self, byte: u8) -> MatchState {
        if let MatchState::Scanning(i) = self.state {
            self.state = if self.signature.bytes[i] != byte {
                MatchState::Rejected
            } else if i + 1 == self.signature.len() {
                MatchState::Accepted
            } else {
                MatchState::Scanning(i + 1)
            };
        }
        self.state
    }

    /// End-of-data: an unfinished scan is rejected.
    pub fn finish(&mut self) -> MatchState {
        if let MatchState::Scanning(_) = self.state {
            self.state = MatchState::Rejected;
        }
        self.state
    }
}

// ── Sniffing ─────────────────────────────────────────────────────────────────

/// `true` iff the source's leading bytes equal `signature`.
///
/// A source shorter than the signature is a non-match, not an error.
pub fn matches<R: Read + ?Sized>(source: &mut R, signature: &Signature) -> Result<bool, Error> {
    let mut matcher = SignatureMatcher::new(signature);
    while !matcher.state().is_terminal() {
        match next_byte(source)? {
            Some(b) => matcher.feed(b),
            None    => matcher.finish(),
        };
    }
    let accepted = matcher.state() == MatchState::Accepted;
    debug!(signature = signature.name(), accepted, "signature check");
    Ok(accepted)
}

/// Open `path` and check it against `signature`.
pub fn matches_file(path: &Path, signature: &Signature) -> Result<bool, Error> {
    let mut f = File::open(path).map_err(|e| Error::path(path, e))?;
    matches(&mut f, signature).map_err(|e| e.at_path(path))
}

/// Classify the source against several formats at once.
///
/// Bytes are fed to every candidate in lock-step; the first candidate to be
/// accepted wins, so when one signature is a prefix of another the shorter
/// one is reported.  Reading stops as soon as a candidate is accepted or all
/// are rejected.
pub fn identify<R: Read + ?Sized>(source: &mut R, candidates: &[Format]) -> Result<Option<Format>, Error> {
    let signatures: Vec<Signature> = candidates.iter().map(|f| f.signature()).collect();
    let mut matchers: Vec<SignatureMatcher<'_>> = signatures.iter().map(SignatureMatcher::new).collect();

    let found = loop {
        if let Some(i) = matchers.iter().position(|m| m.state() == MatchState::Accepted) {
            break Some(candidates[i]);
        }
        if matchers.iter().all(|m| m.state() == MatchState::Rejected) {
            break None;
        }
        match next_byte(source)? {
            Some(b) => matchers.iter_mut().for_each(|m| { m.feed(b); }),
            None    => matchers.iter_mut().for_each(|m| { m.finish(); }),
        }
    };
    debug!(format = ?found, "identify");
    Ok(found)
}

/// Open `path` and classify it against every built-in format.
pub fn identify_file(path: &Path) -> Result<Option<Format>, Error> {
    let mut f = File::open(path).map_err(|e| Error::path(path, e))?;
    identify(&mut f, &Format::ALL).map_err(|e| e.at_path(path))
}

fn next_byte<R: Read + ?Sized>(source: &mut R) -> Result<Option<u8>, Error> {
    let mut b = [0u8; 1];
    loop {
        match source.read(&mut b) {
            Ok(0)  => return Ok(None),
            Ok(_)  => return Ok(Some(b[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Read(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Cursor;

    /// Source that counts bytes handed out.
    struct Counted<R> { inner: R, taken: usize }
    impl<R: Read> Read for Counted<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.taken += n;
            Ok(n)
        }
    }

    fn png() -> Signature { Format::Png.signature() }

    #[test]
    fn png_header_matches_whatever_follows() {
        let mut data = PNG_MAGIC.to_vec();
        data.extend_from_slice(b"\x00\x00\x00\x0DIHDR garbage");
        assert!(matches(&mut Cursor::new(data), &png()).unwrap());
        assert!(matches(&mut Cursor::new(PNG_MAGIC), &png()).unwrap());
    }

    #[test]
    fn first_byte_mismatch_reads_one_byte() {
        let mut src = Counted { inner: Cursor::new([0x00u8]), taken: 0 };
        assert!(!matches(&mut src, &png()).unwrap());
        assert_eq!(src.taken, 1);

        let mut src = Counted { inner: Cursor::new([0x89u8, 0x50, 0x00, 0x47, 0x0D]), taken: 0 };
        assert!(!matches(&mut src, &png()).unwrap());
        assert_eq!(src.taken, 3);
    }

    #[test]
    fn truncated_source_is_false_not_error() {
        assert!(!matches(&mut Cursor::new(&PNG_MAGIC[..5]), &png()).unwrap());
        assert!(!matches(&mut io::empty(), &png()).unwrap());
    }

    #[test]
    fn read_error_propagates() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
        }
        let err = matches(&mut Broken, &png()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }

    #[test]
    fn empty_signature_rejected() {
        assert_eq!(Signature::new("none", Vec::<u8>::new()).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(Signature::from_hex("none", "  ").unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn hex_signature_equals_builtin() {
        let s = Signature::from_hex("png", "89 50 4E 47 0D 0A 1A 0A").unwrap();
        assert_eq!(s, png());
        assert_eq!(s.to_hex(), "89 50 4E 47 0D 0A 1A 0A");
        assert!(Signature::from_hex("bad", "8G").is_err());
    }

    #[test]
    fn matcher_terminal_states_stick() {
        let sig = Signature::new("ab", b"ab".to_vec()).unwrap();
        let mut m = SignatureMatcher::new(&sig);
        assert_eq!(m.feed(b'a'), MatchState::Scanning(1));
        assert_eq!(m.feed(b'b'), MatchState::Accepted);
        assert_eq!(m.feed(b'x'), MatchState::Accepted);
        assert_eq!(m.finish(), MatchState::Accepted);

        let mut m = SignatureMatcher::new(&sig);
        assert_eq!(m.feed(b'x'), MatchState::Rejected);
        assert_eq!(m.feed(b'a'), MatchState::Rejected);

        let mut m = SignatureMatcher::new(&sig);
        m.feed(b'a');
        assert_eq!(m.finish(), MatchState::Rejected);
    }

    #[test]
    fn identify_picks_format() {
        let mut zip = b"PK\x03\x04\x14\x00".to_vec();
        zip.extend_from_slice(&[0u8; 32]);
        assert_eq!(identify(&mut Cursor::new(zip), &Format::ALL).unwrap(), Some(Format::Zip));
        assert_eq!(identify(&mut Cursor::new(b"%PDF-1.7"), &Format::ALL).unwrap(), Some(Format::Pdf));
        assert_eq!(identify(&mut Cursor::new(PNG_MAGIC), &Format::ALL).unwrap(), Some(Format::Png));
        assert_eq!(identify(&mut Cursor::new(b"hello world"), &Format::ALL).unwrap(), None);
        assert_eq!(identify(&mut io::empty(), &Format::ALL).unwrap(), None);
    }

    #[test]
    fn identify_stops_at_decision() {
        let mut src = Counted { inner: Cursor::new(b"GIF89a......".to_vec()), taken: 0 };
        assert_eq!(identify(&mut src, &Format::ALL).unwrap(), Some(Format::Gif));
        assert_eq!(src.taken, GIF_MAGIC.len());

        let mut src = Counted { inner: Cursor::new(b"\x7fELF".to_vec()), taken: 0 };
        assert_eq!(identify(&mut src, &Format::ALL).unwrap(), None);
        assert_eq!(src.taken, 1);
    }

    #[test]
    fn identify_without_candidates() {
        assert_eq!(identify(&mut Cursor::new(PNG_MAGIC), &[]).unwrap(), None);
    }

    #[test]
    fn format_names() {
        for f in Format::ALL {
            assert_eq!(Format::from_name(f.name()), Some(f));
        }
        assert_eq!("JPG".parse::<Format>().unwrap(), Format::Jpeg);
        assert!("bmp".parse::<Format>().is_err());
    }
}
