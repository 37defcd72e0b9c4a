use core::cmp;
use core::fmt;

use memchr::{memchr, memchr3, memchr_iter};

use crate::{DELIMITER, QUOTE};

/// A pull based CSV reader.
///
/// This reader parses CSV data using a finite state machine. Callers can
/// extract parsed data incrementally using the `read_field` and
/// `read_record` methods. At most one byte of lookahead is ever needed, and
/// it is carried as parser state rather than buffered input, so a record may
/// be split across any number of input slices.
///
/// The reader operates on bytes. Since every byte with syntactic meaning
/// (`,`, `"`, `\r` and `\n`) is ASCII, parsing UTF-8 text byte by byte is
/// equivalent to parsing it character by character, and field contents are
/// passed through untouched.
///
/// # RFC 4180
///
/// [RFC 4180](https://tools.ietf.org/html/rfc4180) is followed with these
/// choices made explicit:
///
/// * Records are permitted to be of varying length.
/// * An empty line is a record with a single empty field. A terminator at
///   the very end of the data does not start another record.
/// * Any of `\r`, `\n` or `\r\n` ends a record. `\r\n` counts as a
///   single terminator.
/// * A quote in the middle of an unquoted field is ordinary data.
/// * Any byte other than `"`, `,` or a record terminator following the
///   closing quote of a quoted field is an error
///   (`SyntaxError::MalformedQuoting`). The offending byte is not consumed.
/// * Data ending inside a quoted field is an error
///   (`SyntaxError::UnterminatedQuotedField`).
///
/// Once an error is reported, the reader reports the same error on every
/// subsequent call until `reset` is called.
#[derive(Clone, Debug)]
pub struct Reader {
    /// The current state of the parser.
    state: State,
    /// The current line number.
    line: u64,
    /// The current position in the output buffer when reading a record.
    output_pos: usize,
}

impl Default for Reader {
    fn default() -> Reader {
        Reader {
            state: State::StartRecord,
            line: 1,
            output_pos: 0,
        }
    }
}

/// A syntax error found while parsing CSV data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyntaxError {
    /// Data was found after the closing quote of a quoted field and before
    /// the next delimiter or record terminator. e.g., `"abc"def`.
    MalformedQuoting,
    /// The data ended before the closing quote of a quoted field.
    UnterminatedQuotedField,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SyntaxError::MalformedQuoting => write!(
                f,
                "found data after the closing quote of a quoted field"
            ),
            SyntaxError::UnterminatedQuotedField => {
                write!(f, "data ended inside a quoted field")
            }
        }
    }
}

/// The result of parsing at most one field from CSV data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadFieldResult {
    /// The caller provided input was exhausted before the end of a field or
    /// record was found.
    InputEmpty,
    /// The caller provided output buffer was filled before an entire field
    /// could be written to it.
    OutputFull,
    /// The end of a field was found.
    ///
    /// Note that when `record_end` is true, then the end of this field also
    /// corresponds to the end of a record.
    Field {
        /// Whether this was the last field in a record or not.
        record_end: bool,
    },
    /// All CSV data has been read.
    ///
    /// This state can only be returned when an empty input buffer is provided
    /// by the caller.
    End,
    /// The CSV data is malformed. The field being parsed is incomplete and
    /// must be discarded.
    Error(SyntaxError),
}

impl ReadFieldResult {
    fn from_state(
        state: State,
        inpdone: bool,
        outdone: bool,
    ) -> ReadFieldResult {
        match state {
            State::End => ReadFieldResult::End,
            State::EndRecord | State::CrLf => {
                ReadFieldResult::Field { record_end: true }
            }
            State::EndFieldDelim => {
                ReadFieldResult::Field { record_end: false }
            }
            State::Failed(err) => ReadFieldResult::Error(err),
            _ => {
                debug_assert!(!state.is_field_final());
                if !inpdone && outdone {
                    ReadFieldResult::OutputFull
                } else {
                    ReadFieldResult::InputEmpty
                }
            }
        }
    }
}

/// The result of parsing at most one record from CSV data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadRecordResult {
    /// The caller provided input was exhausted before the end of a record was
    /// found.
    InputEmpty,
    /// The caller provided output buffer was filled before an entire field
    /// could be written to it.
    OutputFull,
    /// The caller provided output buffer of field end positions was filled
    /// before the next field could be parsed.
    OutputEndsFull,
    /// The end of a record was found.
    Record,
    /// All CSV data has been read.
    ///
    /// This state can only be returned when an empty input buffer is provided
    /// by the caller.
    End,
    /// The CSV data is malformed. The record being parsed is incomplete and
    /// must be discarded.
    Error(SyntaxError),
}

impl ReadRecordResult {
    fn is_record(&self) -> bool {
        *self == ReadRecordResult::Record
    }

    fn from_state(
        state: State,
        inpdone: bool,
        outdone: bool,
        endsdone: bool,
    ) -> ReadRecordResult {
        match state {
            State::End => ReadRecordResult::End,
            State::EndRecord | State::CrLf => ReadRecordResult::Record,
            State::Failed(err) => ReadRecordResult::Error(err),
            _ => {
                debug_assert!(!state.is_record_final());
                if !inpdone && outdone {
                    ReadRecordResult::OutputFull
                } else if !inpdone && endsdone {
                    ReadRecordResult::OutputEndsFull
                } else {
                    ReadRecordResult::InputEmpty
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    StartRecord,
    StartField,
    InUnquotedField,
    InQuotedField,
    /// A quote was seen inside a quoted field. The next byte decides whether
    /// it was an escaped quote or the closing quote.
    QuoteInQuotedField,
    EndFieldDelim,
    EndRecord,
    /// A `\r` ended the record; a directly following `\n` is swallowed.
    CrLf,
    End,
    Failed(SyntaxError),
}

impl State {
    fn is_field_final(&self) -> bool {
        match *self {
            State::End
            | State::EndRecord
            | State::CrLf
            | State::EndFieldDelim
            | State::Failed(_) => true,
            _ => false,
        }
    }

    fn is_record_final(&self) -> bool {
        match *self {
            State::End
            | State::EndRecord
            | State::CrLf
            | State::Failed(_) => true,
            _ => false,
        }
    }
}

impl Reader {
    /// Create a new CSV parser.
    pub fn new() -> Reader {
        Reader::default()
    }

    /// Reset the parser such that it behaves as if it had never been used.
    ///
    /// This also clears any previously reported syntax error.
    pub fn reset(&mut self) {
        self.state = State::StartRecord;
        self.line = 1;
        self.output_pos = 0;
    }

    /// Return the current line number as measured by the number of occurrences
    /// of `\n`.
    ///
    /// Line numbers starts at `1` and are reset when `reset` is called.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Parse CSV data in `input` and copy field data to `output`.
    ///
    /// This routine requires a caller provided buffer of CSV data as the
    /// `input` and a caller provided buffer, `output`, in which to store field
    /// data extracted from `input`. The field data copied to `output` will
    /// have its quotes unescaped.
    ///
    /// Calling this routine parses at most a single field and returns
    /// three values indicating the state of the parser. The first value,
    /// a `ReadFieldResult`, tells the caller what to do next. For example,
    /// if the entire input was read or if the output buffer was filled
    /// before a full field had been read, then `ReadFieldResult::InputEmpty`
    /// or `ReadFieldResult::OutputFull` is returned, respectively. See the
    /// documentation for `ReadFieldResult` for more details.
    ///
    /// The second two values returned correspond to the number of bytes
    /// read from `input` and written to `output`, respectively.
    ///
    /// # Termination
    ///
    /// This reader interprets an empty `input` buffer as an indication that
    /// there is no CSV data left to read. Namely, when the caller has
    /// exhausted all CSV data, the caller should continue to call `read_field`
    /// with an empty input buffer until `ReadFieldResult::End` is returned.
    ///
    /// # Errors
    ///
    /// Malformed data is reported with `ReadFieldResult::Error`.
    pub fn read_field(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> (ReadFieldResult, usize, usize) {
        if input.is_empty() {
            self.state = self.transition_final(self.state);
            let res = ReadFieldResult::from_state(self.state, true, false);
            return (res, 0, 0);
        }
        if let State::Failed(err) = self.state {
            return (ReadFieldResult::Error(err), 0, 0);
        }
        if output.is_empty() {
            // If the output buffer is empty, then we can never make progress,
            // so just quit now.
            return (ReadFieldResult::OutputFull, 0, 0);
        }
        let (mut nin, mut nout) = (0, 0);
        let mut state = self.state;
        while nin < input.len() && nout < output.len() {
            let n = self.copy_plain(state, &input[nin..], &mut output[nout..]);
            if n > 0 {
                nin += n;
                nout += n;
                continue;
            }
            let b = input[nin];
            let (s, i, o) = self.transition(state, b);
            if o {
                output[nout] = b;
                nout += 1;
            }
            if i {
                self.line += (b == b'\n') as u64;
                nin += 1;
            }
            state = s;
            if state.is_field_final() {
                break;
            }
        }
        let res = ReadFieldResult::from_state(
            state,
            nin >= input.len(),
            nout >= output.len(),
        );
        self.state = state;
        (res, nin, nout)
    }

    /// Parse a single CSV record in `input` and copy each field contiguously
    /// to `output`, with the end position of each field written to `ends`.
    ///
    /// The end positions in `ends` are relative to the start of the record,
    /// even when the record spans more than one call. That is, callers are
    /// expected to pass the unused remainder of their output buffers on
    /// subsequent calls, e.g., `&mut output[outpos..]` and
    /// `&mut ends[endpos..]`.
    ///
    /// The returned values are the result, followed by the number of bytes
    /// read from `input`, written to `output` and the number of ends written
    /// to `ends`.
    ///
    /// The same termination protocol as `read_field` applies: pass an empty
    /// `input` once all CSV data has been exhausted, until
    /// `ReadRecordResult::End` is returned.
    pub fn read_record(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        ends: &mut [usize],
    ) -> (ReadRecordResult, usize, usize, usize) {
        if input.is_empty() {
            let s = self.transition_final(self.state);
            let res = ReadRecordResult::from_state(s, true, false, false);
            // When reading the final record, the last result the caller
            // gets is an InputEmpty. They have all the field data, but they
            // are missing the end position of the final field. We insert it
            // here, but if `ends` has no room, we can't transition to the
            // next state either.
            return match res {
                ReadRecordResult::Record => {
                    if ends.is_empty() {
                        return (ReadRecordResult::OutputEndsFull, 0, 0, 0);
                    }
                    self.state = s;
                    ends[0] = self.output_pos;
                    self.output_pos = 0;
                    (res, 0, 0, 1)
                }
                _ => {
                    self.state = s;
                    self.output_pos = 0;
                    (res, 0, 0, 0)
                }
            };
        }
        if let State::Failed(err) = self.state {
            return (ReadRecordResult::Error(err), 0, 0, 0);
        }
        if output.is_empty() {
            return (ReadRecordResult::OutputFull, 0, 0, 0);
        }
        if ends.is_empty() {
            return (ReadRecordResult::OutputEndsFull, 0, 0, 0);
        }
        let (mut nin, mut nout, mut nend) = (0, 0, 0);
        let mut state = self.state;
        while nin < input.len() && nout < output.len() && nend < ends.len() {
            let n = self.copy_plain(state, &input[nin..], &mut output[nout..]);
            if n > 0 {
                nin += n;
                nout += n;
                continue;
            }
            let b = input[nin];
            let (s, i, o) = self.transition(state, b);
            if o {
                output[nout] = b;
                nout += 1;
            }
            if i {
                self.line += (b == b'\n') as u64;
                nin += 1;
            }
            state = s;
            if state.is_field_final() {
                if let State::Failed(_) = state {
                    break;
                }
                ends[nend] = self.output_pos + nout;
                nend += 1;
                if state != State::EndFieldDelim {
                    break;
                }
            }
        }
        let res = ReadRecordResult::from_state(
            state,
            nin >= input.len(),
            nout >= output.len(),
            nend >= ends.len(),
        );
        self.state = state;
        if res.is_record() || state.is_record_final() {
            self.output_pos = 0;
        } else {
            self.output_pos += nout;
        }
        (res, nin, nout, nend)
    }

    /// Copy the longest prefix of `input` that cannot change the current
    /// state straight to `output`. Returns the number of bytes copied.
    ///
    /// Only field bodies have such runs: everything up to the next quote in
    /// a quoted field, or up to the next delimiter or terminator in an
    /// unquoted field.
    #[inline(always)]
    fn copy_plain(
        &mut self,
        state: State,
        input: &[u8],
        output: &mut [u8],
    ) -> usize {
        let input = &input[..cmp::min(input.len(), output.len())];
        let found = match state {
            State::InQuotedField => memchr(QUOTE, input),
            State::InUnquotedField => memchr3(DELIMITER, b'\r', b'\n', input),
            _ => return 0,
        };
        let n = found.unwrap_or(input.len());
        output[..n].copy_from_slice(&input[..n]);
        self.line += memchr_iter(b'\n', &input[..n]).count() as u64;
        n
    }

    /// The state to move to when the input is exhausted.
    #[inline(always)]
    fn transition_final(&self, state: State) -> State {
        match state {
            State::End
            | State::StartRecord
            | State::EndRecord
            | State::CrLf => State::End,
            State::StartField
            | State::EndFieldDelim
            | State::InUnquotedField
            | State::QuoteInQuotedField => State::EndRecord,
            State::InQuotedField => {
                State::Failed(SyntaxError::UnterminatedQuotedField)
            }
            State::Failed(err) => State::Failed(err),
        }
    }

    /// Compute the next state given the current state and a byte of input.
    ///
    /// Returns the next state, whether the byte was consumed and whether it
    /// belongs in the output. A transition that does not consume its byte is
    /// an epsilon transition; the same byte is fed to the next state.
    #[inline(always)]
    fn transition(&self, state: State, c: u8) -> (State, bool, bool) {
        match state {
            State::End => (State::End, false, false),
            State::Failed(err) => (State::Failed(err), false, false),
            State::StartRecord => (State::StartField, false, false),
            State::EndRecord => (State::StartRecord, false, false),
            State::EndFieldDelim => (State::StartField, false, false),
            State::CrLf => {
                if c == b'\n' {
                    (State::StartRecord, true, false)
                } else {
                    (State::StartRecord, false, false)
                }
            }
            State::StartField => {
                if c == QUOTE {
                    (State::InQuotedField, true, false)
                } else if c == DELIMITER {
                    (State::EndFieldDelim, true, false)
                } else if is_terminator(c) {
                    (self.end_record(c), true, false)
                } else {
                    (State::InUnquotedField, true, true)
                }
            }
            State::InUnquotedField => {
                if c == DELIMITER {
                    (State::EndFieldDelim, true, false)
                } else if is_terminator(c) {
                    (self.end_record(c), true, false)
                } else {
                    (State::InUnquotedField, true, true)
                }
            }
            State::InQuotedField => {
                if c == QUOTE {
                    (State::QuoteInQuotedField, true, false)
                } else {
                    (State::InQuotedField, true, true)
                }
            }
            State::QuoteInQuotedField => {
                if c == QUOTE {
                    (State::InQuotedField, true, true)
                } else if c == DELIMITER {
                    (State::EndFieldDelim, true, false)
                } else if is_terminator(c) {
                    (self.end_record(c), true, false)
                } else {
                    (State::Failed(SyntaxError::MalformedQuoting), false, false)
                }
            }
        }
    }

    fn end_record(&self, c: u8) -> State {
        if c == b'\r' {
            State::CrLf
        } else {
            State::EndRecord
        }
    }
}

#[inline(always)]
fn is_terminator(c: u8) -> bool {
    c == b'\r' || c == b'\n'
}

#[cfg(test)]
mod tests {
    use core::str;

    use arrayvec::{ArrayString, ArrayVec};

    use super::{ReadFieldResult, Reader, SyntaxError};

    type Csv = ArrayVec<Row, 10>;
    type Row = ArrayVec<Field, 10>;
    type Field = ArrayString<10>;

    fn b(s: &str) -> &[u8] {
        s.as_bytes()
    }

    macro_rules! csv {
        ($([$($field:expr),*]),*) => {{
            #[allow(unused_mut)]
            fn x() -> Csv {
                let mut csv = Csv::new();
                $(
                    let mut row = Row::new();
                    $(
                        row.push(Field::from($field).unwrap());
                    )*
                    csv.push(row);
                )*
                csv
            }
            x()
        }}
    }

    macro_rules! parses_to {
        ($name:ident, $data:expr, $expected:expr) => {
            #[test]
            fn $name() {
                let mut rdr = Reader::new();
                let got = parse_by_field(&mut rdr, $data);
                let expected = Ok($expected);
                assert_eq!(expected, got, "by field");

                let mut rdr = Reader::new();
                let got = parse_by_record(&mut rdr, $data);
                let expected = Ok($expected);
                assert_eq!(expected, got, "by record");
            }
        };
    }

    macro_rules! fails_with {
        ($name:ident, $data:expr, $err:expr) => {
            #[test]
            fn $name() {
                let mut rdr = Reader::new();
                let got = parse_by_field(&mut rdr, $data);
                assert_eq!(Err($err), got, "by field");

                let mut rdr = Reader::new();
                let got = parse_by_record(&mut rdr, $data);
                assert_eq!(Err($err), got, "by record");
            }
        };
    }

    fn parse_by_field(
        rdr: &mut Reader,
        data: &str,
    ) -> Result<Csv, SyntaxError> {
        let mut data = data.as_bytes();
        let mut field = [0u8; 10];
        let mut csv = Csv::new();
        let mut row = Row::new();
        let mut outpos = 0;
        loop {
            let (res, nin, nout) = rdr.read_field(data, &mut field[outpos..]);
            data = &data[nin..];
            outpos += nout;

            match res {
                ReadFieldResult::InputEmpty => {
                    if !data.is_empty() {
                        panic!("missing input data")
                    }
                }
                ReadFieldResult::OutputFull => panic!("field too large"),
                ReadFieldResult::Field { record_end } => {
                    let s = str::from_utf8(&field[..outpos]).unwrap();
                    row.push(Field::from(s).unwrap());
                    outpos = 0;
                    if record_end {
                        csv.push(row);
                        row = Row::new();
                    }
                }
                ReadFieldResult::End => return Ok(csv),
                ReadFieldResult::Error(err) => return Err(err),
            }
        }
    }

    fn parse_by_record(
        rdr: &mut Reader,
        data: &str,
    ) -> Result<Csv, SyntaxError> {
        use crate::ReadRecordResult::*;

        let mut data = data.as_bytes();
        let mut record = [0; 1024];
        let mut ends = [0; 10];

        let mut csv = Csv::new();
        let (mut outpos, mut endpos) = (0, 0);
        loop {
            let (res, nin, nout, nend) = rdr.read_record(
                data,
                &mut record[outpos..],
                &mut ends[endpos..],
            );
            data = &data[nin..];
            outpos += nout;
            endpos += nend;

            match res {
                InputEmpty => {
                    if !data.is_empty() {
                        panic!("missing input data")
                    }
                }
                OutputFull => panic!("record too large (out buffer)"),
                OutputEndsFull => panic!("record too large (end buffer)"),
                Record => {
                    let s = str::from_utf8(&record[..outpos]).unwrap();
                    let mut start = 0;
                    let mut row = Row::new();
                    for &end in &ends[..endpos] {
                        row.push(Field::from(&s[start..end]).unwrap());
                        start = end;
                    }
                    csv.push(row);
                    outpos = 0;
                    endpos = 0;
                }
                End => return Ok(csv),
                Error(err) => return Err(err),
            }
        }
    }

    parses_to!(empty, "", csv![]);
    parses_to!(one_row_one_field, "a", csv![["a"]]);
    parses_to!(one_row_many_fields, "a,b,c", csv![["a", "b", "c"]]);
    parses_to!(one_row_trailing_comma, "a,b,", csv![["a", "b", ""]]);
    parses_to!(one_row_one_field_lf, "a\n", csv![["a"]]);
    parses_to!(one_row_many_fields_lf, "a,b,c\n", csv![["a", "b", "c"]]);
    parses_to!(one_row_trailing_comma_lf, "a,b,\n", csv![["a", "b", ""]]);
    parses_to!(one_row_only_comma, ",", csv![["", ""]]);
    parses_to!(one_row_only_comma_lf, ",\n", csv![["", ""]]);

    parses_to!(many_rows_one_field, "a\nb", csv![["a"], ["b"]]);
    parses_to!(
        many_rows_many_fields,
        "a,b,c\nx,y,z",
        csv![["a", "b", "c"], ["x", "y", "z"]]
    );
    parses_to!(
        many_rows_trailing_comma,
        "a,b,\nx,y,",
        csv![["a", "b", ""], ["x", "y", ""]]
    );
    parses_to!(many_rows_one_field_lf, "a\nb\n", csv![["a"], ["b"]]);
    parses_to!(
        many_rows_many_fields_lf,
        "a,b,c\nx,y,z\n",
        csv![["a", "b", "c"], ["x", "y", "z"]]
    );
    parses_to!(
        many_rows_varying_lengths,
        "a\nb,c\nd,e,f\n",
        csv![["a"], ["b", "c"], ["d", "e", "f"]]
    );

    parses_to!(empty_line, "\n", csv![[""]]);
    parses_to!(empty_lines, "\n\n\n", csv![[""], [""], [""]]);
    parses_to!(
        empty_lines_interspersed,
        "a,b\n\nx,y\n",
        csv![["a", "b"], [""], ["x", "y"]]
    );
    parses_to!(empty_line_last, "a\n\n", csv![["a"], [""]]);

    parses_to!(crlf_by_default, "a\r\nb\r", csv![["a"], ["b"]]);
    parses_to!(
        many_rows_crlf,
        "a,b\r\nx,y\r\n",
        csv![["a", "b"], ["x", "y"]]
    );
    parses_to!(many_rows_cr, "a,b\rx,y\r", csv![["a", "b"], ["x", "y"]]);
    parses_to!(
        many_rows_mixed_terminators,
        "a\rb\nc\r\nd",
        csv![["a"], ["b"], ["c"], ["d"]]
    );
    parses_to!(empty_line_crlf, "\r\n", csv![[""]]);
    parses_to!(empty_lines_crlf, "\r\n\r\n", csv![[""], [""]]);
    parses_to!(empty_lines_cr_then_lf, "\r\r\n", csv![[""], [""]]);
    parses_to!(quoted_crlf, "\"a\r\nb\"\r\n", csv![["a\r\nb"]]);
    parses_to!(
        quoted_last_field_crlf,
        "x,\"a\"\r\ny,z\r\n",
        csv![["x", "a"], ["y", "z"]]
    );
    parses_to!(quoted_last_field_cr, "\"a\"\r\"b\"", csv![["a"], ["b"]]);
    parses_to!(term_is_data_otherwise, "azb,c", csv![["azb", "c"]]);

    parses_to!(quote_empty, "\"\"", csv![[""]]);
    parses_to!(quote_lf, "\"\"\n", csv![[""]]);
    parses_to!(quote_space, "\" \"", csv![[" "]]);
    parses_to!(quote_inner_space, "\" a \"", csv![[" a "]]);
    parses_to!(quote_outer_space, "  \"a\"  ", csv![["  \"a\"  "]]);
    parses_to!(quote_mid_field, "a\"b,c", csv![["a\"b", "c"]]);
    parses_to!(quote_comma, "\"a,b\",c", csv![["a,b", "c"]]);
    parses_to!(quote_newline, "x,\"a\nb\",c\n", csv![["x", "a\nb", "c"]]);
    parses_to!(quote_doubled, "\"a\"\"b\"", csv![["a\"b"]]);
    parses_to!(quote_only_doubled, "\"\"\"\"", csv![["\""]]);
    parses_to!(quote_doubled_at_end, "\"ab\"\"\",c", csv![["ab\"", "c"]]);
    parses_to!(
        quote_all_fields,
        "\"a\",\"b\"\n\"c\",\"d\"\n",
        csv![["a", "b"], ["c", "d"]]
    );
    parses_to!(quote_empty_fields, "\"\",\"\"", csv![["", ""]]);

    fails_with!(
        malformed_text_after_quote,
        "\"abc\"def,x\n",
        SyntaxError::MalformedQuoting
    );
    fails_with!(
        malformed_space_after_quote,
        "a,\"b\" ,c\n",
        SyntaxError::MalformedQuoting
    );
    fails_with!(
        malformed_second_row,
        "a,b\n\"c\"d\n",
        SyntaxError::MalformedQuoting
    );
    fails_with!(
        unterminated,
        "\"abc",
        SyntaxError::UnterminatedQuotedField
    );
    fails_with!(
        unterminated_after_newline,
        "a,\"b\nc\n",
        SyntaxError::UnterminatedQuotedField
    );
    fails_with!(
        unterminated_escaped_quote,
        "\"a\"\"",
        SyntaxError::UnterminatedQuotedField
    );

    macro_rules! assert_read {
        (
            $rdr:expr, $input:expr, $output:expr,
            $expect_in:expr, $expect_out:expr, $expect_res:expr
        ) => {{
            let (res, nin, nout) = $rdr.read_field($input, $output);
            assert_eq!($expect_in, nin);
            assert_eq!($expect_out, nout);
            assert_eq!($expect_res, res);
        }};
    }

    // This tests that feeding a new reader with an empty buffer sends us
    // straight to End.
    #[test]
    fn stream_empty() {
        use crate::ReadFieldResult::*;

        let mut rdr = Reader::new();
        assert_read!(rdr, &[], &mut [], 0, 0, End);
    }

    // Test that a single space is treated as a single field.
    #[test]
    fn stream_space() {
        use crate::ReadFieldResult::*;

        let mut rdr = Reader::new();
        assert_read!(rdr, b(" "), &mut [0], 1, 1, InputEmpty);
        assert_read!(rdr, &[], &mut [0], 0, 0, Field { record_end: true });
        assert_read!(rdr, &[], &mut [0], 0, 0, End);
    }

    // Test that a single comma is two empty fields.
    #[test]
    fn stream_comma() {
        use crate::ReadFieldResult::*;

        let mut rdr = Reader::new();
        assert_read!(rdr, b(","), &mut [0], 1, 0, Field { record_end: false });
        assert_read!(rdr, &[], &mut [0], 0, 0, Field { record_end: true });
        assert_read!(rdr, &[], &mut [0], 0, 0, End);
    }

    // Test that a lone newline is one empty field and that the final
    // terminator doesn't start another record.
    #[test]
    fn stream_empty_line() {
        use crate::ReadFieldResult::*;

        let mut rdr = Reader::new();
        assert_read!(rdr, b("\n"), &mut [0], 1, 0, Field { record_end: true });
        assert_read!(rdr, &[], &mut [0], 0, 0, End);
    }

    // Test that we can read a single large field in multiple output
    // buffers.
    #[test]
    fn stream_output_chunks() {
        use crate::ReadFieldResult::*;

        let mut inp = b("fooquux");
        let out = &mut [0; 2];
        let mut rdr = Reader::new();

        assert_read!(rdr, inp, out, 2, 2, OutputFull);
        assert_eq!(out, b("fo"));
        inp = &inp[2..];

        assert_read!(rdr, inp, out, 2, 2, OutputFull);
        assert_eq!(out, b("oq"));
        inp = &inp[2..];

        assert_read!(rdr, inp, out, 2, 2, OutputFull);
        assert_eq!(out, b("uu"));
        inp = &inp[2..];

        assert_read!(rdr, inp, out, 1, 1, InputEmpty);
        assert_eq!(&out[..1], b("x"));
        inp = &inp[1..];
        assert!(inp.is_empty());

        assert_read!(rdr, &[], out, 0, 0, Field { record_end: true });
        assert_read!(rdr, inp, out, 0, 0, End);
    }

    // Test that we can read a single large field across multiple input
    // buffers.
    #[test]
    fn stream_input_chunks() {
        use crate::ReadFieldResult::*;

        let out = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read!(rdr, b("fo"), out, 2, 2, InputEmpty);
        assert_eq!(&out[..2], b("fo"));

        assert_read!(rdr, b("oq"), &mut out[2..], 2, 2, InputEmpty);
        assert_eq!(&out[..4], b("fooq"));

        assert_read!(rdr, b("uu"), &mut out[4..], 2, 2, InputEmpty);
        assert_eq!(&out[..6], b("fooquu"));

        assert_read!(rdr, b("x"), &mut out[6..], 1, 1, InputEmpty);
        assert_eq!(&out[..7], b("fooquux"));

        assert_read!(rdr, &[], out, 0, 0, Field { record_end: true });
        assert_read!(rdr, &[], out, 0, 0, End);
    }

    // Test we can read doubled quotes correctly when the two quotes are
    // split across input buffers.
    #[test]
    fn stream_doubled_quotes() {
        use crate::ReadFieldResult::*;

        let out = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read!(rdr, b("\"fo\""), out, 4, 2, InputEmpty);
        assert_eq!(&out[..2], b("fo"));

        assert_read!(rdr, b("\"o\""), &mut out[2..], 3, 2, InputEmpty);
        assert_eq!(&out[..4], b("fo\"o"));

        assert_read!(rdr, &[], out, 0, 0, Field { record_end: true });
        assert_read!(rdr, &[], out, 0, 0, End);
    }

    // Test that a closing quote at the end of one buffer followed by a
    // delimiter at the start of the next ends the field.
    #[test]
    fn stream_closing_quote_split() {
        use crate::ReadFieldResult::*;

        let out = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read!(rdr, b("\"fo\""), out, 4, 2, InputEmpty);
        assert_read!(rdr, b(",x"), out, 1, 0, Field { record_end: false });
        assert_read!(rdr, b("x"), out, 1, 1, InputEmpty);
        assert_read!(rdr, &[], out, 0, 0, Field { record_end: true });
        assert_read!(rdr, &[], out, 0, 0, End);
    }

    // Test that empty output buffers don't wreak havoc.
    #[test]
    fn stream_empty_output() {
        use crate::ReadFieldResult::*;

        let out = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read!(
            rdr,
            b("foo,bar"),
            out,
            4,
            3,
            Field { record_end: false }
        );
        assert_eq!(&out[..3], b("foo"));

        assert_read!(rdr, b("bar"), &mut [], 0, 0, OutputFull);

        assert_read!(rdr, b("bar"), out, 3, 3, InputEmpty);
        assert_eq!(&out[..3], b("bar"));

        assert_read!(rdr, &[], out, 0, 0, Field { record_end: true });
        assert_read!(rdr, &[], out, 0, 0, End);
    }

    // Test that a malformed quote is reported without consuming the
    // offending byte, and that the error sticks until a reset.
    #[test]
    fn stream_malformed() {
        use crate::ReadFieldResult::*;

        let out = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read!(
            rdr,
            b("\"a\"b,c"),
            out,
            3,
            1,
            Error(SyntaxError::MalformedQuoting)
        );
        assert_read!(
            rdr,
            b("b,c"),
            out,
            0,
            0,
            Error(SyntaxError::MalformedQuoting)
        );
        assert_read!(
            rdr,
            &[],
            out,
            0,
            0,
            Error(SyntaxError::MalformedQuoting)
        );

        rdr.reset();
        assert_read!(rdr, b("b,c"), out, 2, 1, Field { record_end: false });
    }

    #[test]
    fn stream_unterminated() {
        use crate::ReadFieldResult::*;

        let out = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read!(rdr, b("\"ab"), out, 3, 2, InputEmpty);
        assert_read!(
            rdr,
            &[],
            out,
            0,
            0,
            Error(SyntaxError::UnterminatedQuotedField)
        );
        assert_read!(
            rdr,
            &[],
            out,
            0,
            0,
            Error(SyntaxError::UnterminatedQuotedField)
        );
    }

    // Test that we can reset the parser mid-stream and count on it to do
    // the right thing.
    #[test]
    fn reset_works() {
        use crate::ReadFieldResult::*;

        let out = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read!(rdr, b("\"foo"), out, 4, 3, InputEmpty);
        assert_eq!(&out[..3], b("foo"));

        // Without resetting the parser state, the reader would remember that
        // we're in a quoted field, and interpret the trailing quote below as
        // the closing quote. With the reset, it starts an unquoted field in
        // which a quote is ordinary data.
        rdr.reset();

        assert_read!(rdr, b("bar\""), out, 4, 4, InputEmpty);
        assert_eq!(&out[..4], b("bar\""));
    }

    // Test the line number reporting is correct.
    #[test]
    fn line_numbers() {
        use crate::ReadFieldResult::*;

        let out = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_eq!(1, rdr.line());

        let inp = b("foo,bar\nbaz\n\"a\nb\"\n");
        assert_read!(rdr, inp, out, 4, 3, Field { record_end: false });
        assert_eq!(1, rdr.line());

        assert_read!(rdr, &inp[4..], out, 4, 3, Field { record_end: true });
        assert_eq!(2, rdr.line());

        assert_read!(rdr, &inp[8..], out, 4, 3, Field { record_end: true });
        assert_eq!(3, rdr.line());

        assert_read!(rdr, &inp[12..], out, 6, 3, Field { record_end: true });
        assert_eq!(5, rdr.line());

        assert_read!(rdr, &[], out, 0, 0, End);
        assert_eq!(5, rdr.line());
    }

    macro_rules! assert_read_record {
        (
            $rdr:expr, $input:expr, $output:expr, $ends:expr,
            $expect_in:expr, $expect_out:expr,
            $expect_end:expr, $expect_res:expr
        ) => {{
            let (res, nin, nout, nend) =
                $rdr.read_record($input, $output, $ends);
            assert_eq!($expect_res, res, "result");
            assert_eq!($expect_in, nin, "input");
            assert_eq!($expect_out, nout, "output");
            assert_eq!($expect_end, nend, "ends");
        }};
    }

    // Test that we can incrementally read a record.
    #[test]
    fn stream_record() {
        use crate::ReadRecordResult::*;

        let mut inp = b("foo,bar\nbaz");
        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read_record!(rdr, &inp, out, ends, 8, 6, 2, Record);
        assert_eq!(ends[0], 3);
        assert_eq!(ends[1], 6);
        inp = &inp[8..];

        assert_read_record!(rdr, &inp, out, ends, 3, 3, 0, InputEmpty);
        inp = &inp[3..];

        assert_read_record!(rdr, &inp, out, ends, 0, 0, 1, Record);
        assert_eq!(ends[0], 3);

        assert_read_record!(rdr, &inp, out, ends, 0, 0, 0, End);
    }

    // Test that if our output ends are full during the last read that
    // we get an appropriate state returned.
    #[test]
    fn stream_record_last_end_output_full() {
        use crate::ReadRecordResult::*;

        let mut inp = b("foo,bar\nbaz");
        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read_record!(rdr, &inp, out, ends, 8, 6, 2, Record);
        assert_eq!(ends[0], 3);
        assert_eq!(ends[1], 6);
        inp = &inp[8..];

        assert_read_record!(rdr, &inp, out, ends, 3, 3, 0, InputEmpty);
        inp = &inp[3..];

        assert_read_record!(rdr, &inp, out, &mut [], 0, 0, 0, OutputEndsFull);
        assert_read_record!(rdr, &inp, out, ends, 0, 0, 1, Record);
        assert_eq!(ends[0], 3);

        assert_read_record!(rdr, &inp, out, ends, 0, 0, 0, End);
    }

    // Test that field ends stay relative to the start of the record when a
    // record is split across calls.
    #[test]
    fn stream_record_split() {
        use crate::ReadRecordResult::*;

        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read_record!(rdr, b("ab,c"), out, ends, 4, 3, 1, InputEmpty);
        assert_eq!(ends[0], 2);

        assert_read_record!(
            rdr,
            b("d,e\n"),
            &mut out[3..],
            &mut ends[1..],
            4,
            2,
            2,
            Record
        );
        assert_eq!(&out[..5], b("abcde"));
        assert_eq!(&ends[..3], &[2, 4, 5]);

        assert_read_record!(rdr, &[], out, ends, 0, 0, 0, End);
    }

    #[test]
    fn stream_record_empty_lines() {
        use crate::ReadRecordResult::*;

        let inp = b("\n\na\n");
        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read_record!(rdr, inp, out, ends, 1, 0, 1, Record);
        assert_eq!(ends[0], 0);
        assert_read_record!(rdr, &inp[1..], out, ends, 1, 0, 1, Record);
        assert_eq!(ends[0], 0);
        assert_read_record!(rdr, &inp[2..], out, ends, 2, 1, 1, Record);
        assert_eq!(ends[0], 1);
        assert_read_record!(rdr, &[], out, ends, 0, 0, 0, End);
    }

    #[test]
    fn stream_record_malformed() {
        use crate::ReadRecordResult::*;

        let out = &mut [0; 1024];
        let ends = &mut [0; 10];
        let mut rdr = Reader::new();

        assert_read_record!(
            rdr,
            b("a,\"b\"c\n"),
            out,
            ends,
            5,
            2,
            1,
            Error(SyntaxError::MalformedQuoting)
        );
        assert_read_record!(
            rdr,
            b("c\n"),
            out,
            ends,
            0,
            0,
            0,
            Error(SyntaxError::MalformedQuoting)
        );
    }
}
