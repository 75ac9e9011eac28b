/// Line framing for the control plane
use std::io::{self, Read, Write};

use crate::error::ReadError;

/// Bytes that end a command line. Neither is part of the returned line.
pub const LINE_TERMINATORS: [u8; 2] = [b'\n', b';'];

/// Writes `line` followed by a single newline and flushes the writer.
pub fn write_line(writer: &mut impl Write, line: &str) -> io::Result<()> {
    let mut framed = Vec::with_capacity(line.len() + 1);
    framed.extend_from_slice(line.as_bytes());
    framed.push(b'\n');
    writer.write_all(&framed)?;
    writer.flush()
}

/// Reads a single line terminated by a newline or a semicolon.
///
/// Bytes are consumed one at a time so nothing past the terminator is taken from the
/// reader. There is no upper bound on the line length. Fails with
/// [`io::ErrorKind::UnexpectedEof`] once the peer closes the connection.
pub fn read_line(reader: &mut impl Read) -> Result<String, ReadError> {
    let mut line = Vec::with_capacity(32);
    let mut byte = [0u8; 1];
    loop {
        reader.read_exact(&mut byte)?;
        if LINE_TERMINATORS.contains(&byte[0]) {
            break;
        }
        line.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&line).into_owned())
}

#[cfg(feature = "tokio")]
pub use self::framed::ScpiLineCodec;

#[cfg(feature = "tokio")]
mod framed {
    use bytes::{BufMut, BytesMut};
    use tokio_util::codec::{Decoder, Encoder};

    use super::LINE_TERMINATORS;
    use crate::error::ReadError;

    /// [`Decoder`] and [`Encoder`] for the same framing as [`super::read_line`] and
    /// [`super::write_line`].
    #[derive(Clone, Copy, Debug, Default)]
    pub struct ScpiLineCodec;

    impl Decoder for ScpiLineCodec {
        type Item = String;
        type Error = ReadError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
            let Some(end) = src.iter().position(|b| LINE_TERMINATORS.contains(b)) else {
                return Ok(None);
            };
            let line = src.split_to(end + 1);
            Ok(Some(String::from_utf8_lossy(&line[..end]).into_owned()))
        }
    }

    impl Encoder<&str> for ScpiLineCodec {
        type Error = ReadError;

        fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
            dst.reserve(item.len() + 1);
            dst.put_slice(item.as_bytes());
            dst.put_u8(b'\n');
            Ok(())
        }
    }

}
