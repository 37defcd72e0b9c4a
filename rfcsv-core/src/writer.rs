use memchr::memchr;

use crate::{Terminator, DELIMITER, QUOTE};

/// The quoting style to use when writing CSV data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QuoteStyle {
    /// This puts quotes around every field. Always.
    Always,
    /// This puts quotes around fields only when necessary.
    ///
    /// They are necessary when fields contain a quote, delimiter, `\r` or
    /// `\n`. Empty fields are not quoted.
    ///
    /// This is the default.
    Necessary,
}

impl Default for QuoteStyle {
    fn default() -> QuoteStyle {
        QuoteStyle::Necessary
    }
}

/// A builder for configuring a CSV writer.
///
/// This builder permits specifying the record terminator and quoting style.
#[derive(Debug)]
pub struct WriterBuilder {
    wtr: Writer,
}

impl WriterBuilder {
    /// Create a new builder for configuring a CSV writer.
    pub fn new() -> WriterBuilder {
        WriterBuilder {
            wtr: Writer {
                state: WriterState { in_field: false, quoting: false },
                requires_quotes: [false; 256],
                term: Terminator::default(),
                style: QuoteStyle::default(),
            },
        }
    }

    /// Build a CSV writer from this configuration.
    pub fn build(&self) -> Writer {
        let mut wtr = self.wtr.clone();
        wtr.requires_quotes = [false; 256];
        wtr.requires_quotes[DELIMITER as usize] = true;
        wtr.requires_quotes[QUOTE as usize] = true;
        wtr.requires_quotes[b'\r' as usize] = true;
        wtr.requires_quotes[b'\n' as usize] = true;
        wtr
    }

    /// The record terminator to use when writing CSV.
    ///
    /// The default is `Terminator::LF`, which writes `\n`.
    /// `Terminator::CRLF` writes `\r\n`.
    pub fn terminator(&mut self, term: Terminator) -> &mut WriterBuilder {
        self.wtr.term = term;
        self
    }

    /// The quoting style to use when writing CSV.
    ///
    /// By default, this is set to `QuoteStyle::Necessary`, which will only
    /// use quotes when they are necessary to preserve the integrity of data.
    pub fn quote_style(&mut self, style: QuoteStyle) -> &mut WriterBuilder {
        self.wtr.style = style;
        self
    }
}

impl Default for WriterBuilder {
    fn default() -> WriterBuilder {
        WriterBuilder::new()
    }
}

/// The result of writing CSV data.
///
/// A value of this type is returned from every interaction with `Writer`. It
/// informs the caller how to proceed, namely, by indicating whether more
/// input should be given (`InputEmpty`) or if a bigger output buffer is needed
/// (`OutputFull`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WriteResult {
    /// This result occurs when all of the caller provided input was consumed
    /// and the caller should supply more input. For example, if the caller
    /// was writing a field, this indicates the entire field has been written.
    InputEmpty,
    /// This result occurs when the caller provided output buffer was filled
    /// before all of the caller provided input was consumed. The caller
    /// should flush the output and try again with the rest of the input.
    OutputFull,
}

/// A writer for CSV data.
///
/// Like the reader, this writer performs no I/O. Callers write fields with
/// `field`, separate them with `delimiter` and end records with
/// `terminator`. Each call reports how many bytes of input it consumed and
/// how many bytes of output it produced.
///
/// # RFC 4180
///
/// This writer conforms to RFC 4180 with one exception: it doesn't guarantee
/// that all records written are of the same length. Instead, the onus is on
/// the caller to ensure that all records written are of the same length.
///
/// The writer uses `\n` as the record terminator by default, on every
/// platform.
#[derive(Clone, Debug)]
pub struct Writer {
    state: WriterState,
    requires_quotes: [bool; 256],
    term: Terminator,
    style: QuoteStyle,
}

#[derive(Clone, Debug)]
struct WriterState {
    /// Whether the quoting decision for the current field has been made.
    /// This is set on the first call to `field` for a field and cleared by
    /// `delimiter` and `terminator`.
    in_field: bool,
    /// Whether the current field was opened with a quote, which means a
    /// closing quote is pending.
    quoting: bool,
}

impl Default for Writer {
    fn default() -> Writer {
        Writer::new()
    }
}

impl Writer {
    /// Creates a new CSV writer with the default configuration.
    pub fn new() -> Writer {
        WriterBuilder::new().build()
    }

    /// Write a single CSV field from `input` to `output` while employing this
    /// writer's quoting style.
    ///
    /// This returns the result of writing field data, in addition to the
    /// number of bytes consumed from `input` and the number of bytes
    /// written to `output`.
    ///
    /// The result of writing field data is either `WriteResult::InputEmpty`
    /// or `WriteResult::OutputFull`. The former occurs when all bytes in
    /// `input` were copied to `output`, while the latter occurs when `output`
    /// is too small to fit everything from `input`. The maximum number of
    /// bytes that can be written to `output` is `2 + (2 * input.len())`
    /// because of quoting. (The worst case is a field consisting entirely
    /// of quotes.)
    ///
    /// Multiple successive calls to `field` will write more data to the same
    /// field. Subsequent fields can be written by calling either `delimiter`
    /// or `terminator` first. Whether a field is quoted is decided by the
    /// input given to the first call for that field.
    pub fn field(
        &mut self,
        input: &[u8],
        mut output: &mut [u8],
    ) -> (WriteResult, usize, usize) {
        let (mut nin, mut nout) = (0, 0);
        if !self.state.in_field {
            self.state.quoting = self.should_quote(input);
            if self.state.quoting {
                if output.is_empty() {
                    return (WriteResult::OutputFull, 0, 0);
                }
                output[0] = QUOTE;
                output = &mut { output }[1..];
                nout += 1;
            }
            self.state.in_field = true;
        }
        let (res, i, o) = if self.state.quoting {
            quote(input, output)
        } else {
            write_all(input, output)
        };
        nin += i;
        nout += o;
        (res, nin, nout)
    }

    /// Write the configured field delimiter to `output`.
    ///
    /// If the field just written was quoted, its closing quote is written
    /// first. Nothing is written when `output` can't hold everything, in
    /// which case `WriteResult::OutputFull` is returned.
    pub fn delimiter(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        self.close_and_write(&[DELIMITER], output)
    }

    /// Write the configured record terminator to `output`.
    ///
    /// If the field just written was quoted, its closing quote is written
    /// first. Nothing is written when `output` can't hold everything, in
    /// which case `WriteResult::OutputFull` is returned.
    pub fn terminator(&mut self, output: &mut [u8]) -> (WriteResult, usize) {
        match self.term {
            Terminator::LF => self.close_and_write(&[b'\n'], output),
            Terminator::CRLF => self.close_and_write(&[b'\r', b'\n'], output),
        }
    }

    /// Returns true if and only if the given input field *requires* quotes to
    /// preserve the integrity of `input` while taking into account the
    /// current configuration of this writer (except for the configured
    /// quoting style).
    #[inline]
    pub fn is_quote_needed(&self, input: &[u8]) -> bool {
        input.iter().any(|&b| self.requires_quotes[b as usize])
    }

    fn should_quote(&self, input: &[u8]) -> bool {
        match self.style {
            QuoteStyle::Always => true,
            QuoteStyle::Necessary => self.is_quote_needed(input),
        }
    }

    fn close_and_write(
        &mut self,
        data: &[u8],
        output: &mut [u8],
    ) -> (WriteResult, usize) {
        let closing = self.state.quoting as usize;
        if closing + data.len() > output.len() {
            return (WriteResult::OutputFull, 0);
        }
        if self.state.quoting {
            output[0] = QUOTE;
        }
        output[closing..closing + data.len()].copy_from_slice(data);
        self.state.in_field = false;
        self.state.quoting = false;
        (WriteResult::InputEmpty, closing + data.len())
    }
}

/// Escape quotes in `input` and write the result to `output`.
///
/// Every `"` in `input` is written as `""`. No surrounding quotes are
/// written.
///
/// This returns the result of escaping, in addition to the number of bytes
/// consumed from `input` and the number of bytes written to `output`. An
/// escaped quote is never split: if only one byte of room is left when a
/// quote is reached, the quote is left in `input` and `OutputFull` is
/// returned.
pub fn quote(
    mut input: &[u8],
    mut output: &mut [u8],
) -> (WriteResult, usize, usize) {
    let (mut nin, mut nout) = (0, 0);
    loop {
        match memchr(QUOTE, input) {
            None => {
                let (res, i, o) = write_all(input, output);
                return (res, nin + i, nout + o);
            }
            Some(next_quote) => {
                let (res, i, o) = write_all(&input[..next_quote], output);
                input = &input[i..];
                output = &mut { output }[o..];
                nin += i;
                nout += o;
                if let WriteResult::OutputFull = res {
                    return (res, nin, nout);
                }
                if output.len() < 2 {
                    return (WriteResult::OutputFull, nin, nout);
                }
                output[0] = QUOTE;
                output[1] = QUOTE;
                input = &input[1..];
                nin += 1;
                output = &mut { output }[2..];
                nout += 2;
            }
        }
    }
}

/// Copy as much of `data` as fits into `output`.
fn write_all(data: &[u8], output: &mut [u8]) -> (WriteResult, usize, usize) {
    if data.len() > output.len() {
        let n = output.len();
        output.copy_from_slice(&data[..n]);
        (WriteResult::OutputFull, n, n)
    } else {
        output[..data.len()].copy_from_slice(data);
        (WriteResult::InputEmpty, data.len(), data.len())
    }
}

#[cfg(test)]
mod tests {
    use arrayvec::ArrayVec;

    use super::{quote, QuoteStyle, WriteResult, Writer, WriterBuilder};
    use crate::Terminator;

    use super::WriteResult::*;

    macro_rules! assert_field {
        (
            $wtr:expr, $inp:expr, $out:expr,
            $expect_in:expr, $expect_out:expr,
            $expect_res:expr, $expect_data:expr
        ) => {{
            let out: &mut [u8] = $out;
            let (res, i, o) = $wtr.field($inp, out);
            assert_eq!($expect_res, res, "result");
            assert_eq!($expect_in, i, "input");
            assert_eq!($expect_out, o, "output");
            assert_eq!($expect_data, &out[..o], "data");
        }};
    }

    macro_rules! assert_write {
        (
            $wtr:expr, $which:ident, $out:expr,
            $expect_out:expr, $expect_res:expr, $expect_data:expr
        ) => {{
            let out: &mut [u8] = $out;
            let (res, o) = $wtr.$which(out);
            assert_eq!($expect_res, res, "result");
            assert_eq!($expect_out, o, "output");
            assert_eq!($expect_data, &out[..o], "data");
        }};
    }

    /// Encode a whole record into a fixed size buffer.
    fn encode(wtr: &mut Writer, fields: &[&str]) -> ArrayVec<u8, 64> {
        let mut buf = [0u8; 64];
        let mut pos = 0;
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                let (res, o) = wtr.delimiter(&mut buf[pos..]);
                assert_eq!(InputEmpty, res);
                pos += o;
            }
            let (res, _, o) = wtr.field(field.as_bytes(), &mut buf[pos..]);
            assert_eq!(InputEmpty, res);
            pos += o;
        }
        let (res, o) = wtr.terminator(&mut buf[pos..]);
        assert_eq!(InputEmpty, res);
        pos += o;
        buf[..pos].iter().copied().collect()
    }

    #[test]
    fn write_plain_record() {
        let mut wtr = Writer::new();
        assert_eq!(&encode(&mut wtr, &["a", "b", "c"])[..], b"a,b,c\n");
    }

    #[test]
    fn write_quoted_record() {
        let mut wtr = Writer::new();
        assert_eq!(
            &encode(&mut wtr, &["a,b", "c\"d", "plain"])[..],
            &b"\"a,b\",\"c\"\"d\",plain\n"[..]
        );
    }

    #[test]
    fn write_newlines_quoted() {
        let mut wtr = Writer::new();
        assert_eq!(
            &encode(&mut wtr, &["x\ny", "x\ry"])[..],
            &b"\"x\ny\",\"x\ry\"\n"[..]
        );
    }

    #[test]
    fn write_empty_fields_unquoted() {
        let mut wtr = Writer::new();
        assert_eq!(&encode(&mut wtr, &[""])[..], b"\n");
        assert_eq!(&encode(&mut wtr, &["", ""])[..], b",\n");
        assert_eq!(&encode(&mut wtr, &[])[..], b"\n");
    }

    #[test]
    fn write_quote_always() {
        let mut wtr =
            WriterBuilder::new().quote_style(QuoteStyle::Always).build();
        assert_eq!(&encode(&mut wtr, &["a", ""])[..], b"\"a\",\"\"\n");
    }

    #[test]
    fn write_crlf() {
        let mut wtr =
            WriterBuilder::new().terminator(Terminator::CRLF).build();
        assert_eq!(&encode(&mut wtr, &["a", "b"])[..], b"a,b\r\n");
        assert_eq!(&encode(&mut wtr, &["a\"", "b"])[..], b"\"a\"\"\",b\r\n");
    }

    #[test]
    fn write_terminator_bytes_always_quoted() {
        for &term in &[Terminator::LF, Terminator::CRLF] {
            let mut wtr = WriterBuilder::new().terminator(term).build();
            let got = encode(&mut wtr, &["a\r", "b\n", "c"]);
            assert!(got.starts_with(b"\"a\r\",\"b\n\",c"), "{:?}", term);
        }
    }

    #[test]
    fn write_is_deterministic() {
        let mut wtr = Writer::new();
        let first = encode(&mut wtr, &["x,y", "\"", ""]);
        let second = encode(&mut wtr, &["x,y", "\"", ""]);
        assert_eq!(first, second);
    }

    #[test]
    fn is_quote_needed() {
        let wtr = Writer::new();
        assert!(!wtr.is_quote_needed(b""));
        assert!(!wtr.is_quote_needed(b"abc def"));
        assert!(wtr.is_quote_needed(b"a,b"));
        assert!(wtr.is_quote_needed(b"a\"b"));
        assert!(wtr.is_quote_needed(b"a\nb"));
        assert!(wtr.is_quote_needed(b"a\rb"));
    }

    #[test]
    fn field_output_full_resumes() {
        let mut wtr = Writer::new();
        let out = &mut [0; 3];

        assert_field!(wtr, b"a,bcd", out, 2, 3, OutputFull, b"\"a,");
        assert_field!(wtr, b"bcd", out, 3, 3, InputEmpty, b"bcd");
        assert_write!(wtr, terminator, &mut [0; 1], 0, OutputFull, b"");
        assert_write!(wtr, terminator, out, 2, InputEmpty, b"\"\n");
    }

    #[test]
    fn field_no_room_for_opening_quote() {
        let mut wtr = Writer::new();
        assert_field!(wtr, b"a\"b", &mut [], 0, 0, OutputFull, b"");
        assert_field!(wtr, b"a\"b", &mut [0; 10], 3, 6, InputEmpty, b"\"a\"\"b");
    }

    #[test]
    fn delimiter_closes_quote() {
        let mut wtr = Writer::new();
        assert_field!(wtr, b"\"", &mut [0; 10], 1, 3, InputEmpty, b"\"\"\"");
        assert_write!(wtr, delimiter, &mut [0; 1], 0, OutputFull, b"");
        assert_write!(wtr, delimiter, &mut [0; 2], 2, InputEmpty, b"\",");
    }

    #[test]
    fn quote_empty() {
        let inp = b"";
        let out = &mut [0; 0];
        assert_eq!((WriteResult::InputEmpty, 0, 0), quote(inp, out));
    }

    #[test]
    fn quote_no_quotes() {
        let inp = b"foobar";
        let out = &mut [0; 10];
        assert_eq!((WriteResult::InputEmpty, 6, 6), quote(inp, out));
        assert_eq!(&out[..6], b"foobar");
    }

    #[test]
    fn quote_doubles_quotes() {
        let inp = b"a\"b\"\"";
        let out = &mut [0; 10];
        assert_eq!((WriteResult::InputEmpty, 5, 8), quote(inp, out));
        assert_eq!(&out[..8], b"a\"\"b\"\"\"\"");
    }

    #[test]
    fn quote_never_splits_escape() {
        let inp = b"ab\"c";
        let out = &mut [0; 3];
        assert_eq!((WriteResult::OutputFull, 2, 2), quote(inp, out));
        assert_eq!(&out[..2], b"ab");

        let out = &mut [0; 3];
        assert_eq!((WriteResult::InputEmpty, 2, 3), quote(&inp[2..], out));
        assert_eq!(&out[..3], b"\"\"c");
    }
}
