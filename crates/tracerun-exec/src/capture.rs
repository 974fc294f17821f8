use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

const CHUNK: usize = 8 * 1024;

/// Drain `reader` to EOF, logging each line and keeping the last `max_bytes`
/// of output.
///
/// Output is handled as bytes; invalid UTF-8 is replaced, never fatal. Lines
/// longer than `max_bytes` are logged in pieces, so memory stays bounded even
/// when the stream never emits a newline.
pub async fn pump<R>(mut reader: R, stream: &'static str, log: bool, max_bytes: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let max_bytes = max_bytes.max(1);
    let mut chunk = vec![0u8; CHUNK];
    let mut tail = Vec::new();
    let mut line = Vec::new();

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(target: "tracerun.exec.container.output", stream, error = %e, "read failed");
                break;
            }
        };
        let bytes = &chunk[..n];
        push_tail(&mut tail, bytes, max_bytes);

        if log {
            for piece in bytes.split_inclusive(|b| *b == b'\n') {
                line.extend_from_slice(piece);
                if line.ends_with(b"\n") || line.len() >= max_bytes {
                    emit(stream, &line);
                    line.clear();
                }
            }
        }
    }
    if log && !line.is_empty() {
        emit(stream, &line);
    }

    into_text(&tail)
}

fn emit(stream: &'static str, line: &[u8]) {
    let text = String::from_utf8_lossy(line);
    debug!(target: "tracerun.exec.container.output", stream, "{}", text.trim_end_matches(['\n', '\r']));
}

/// Append `bytes`, dropping the oldest bytes past `max_bytes`.
pub fn push_tail(tail: &mut Vec<u8>, bytes: &[u8], max_bytes: usize) {
    if bytes.len() >= max_bytes {
        tail.clear();
        tail.extend_from_slice(&bytes[bytes.len() - max_bytes..]);
        return;
    }
    tail.extend_from_slice(bytes);
    if tail.len() > max_bytes {
        let cut = tail.len() - max_bytes;
        tail.drain(..cut);
    }
}

/// Decode the tail, skipping a character cut in half at the front.
fn into_text(tail: &[u8]) -> String {
    let start = tail
        .iter()
        .take(3)
        .take_while(|b| (**b & 0b1100_0000) == 0b1000_0000)
        .count();
    String::from_utf8_lossy(&tail[start..]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_everything_under_limit() {
        let mut tail = Vec::new();
        push_tail(&mut tail, b"a\n", 10);
        push_tail(&mut tail, b"b\n", 10);
        assert_eq!(tail, b"a\nb\n");
    }

    #[test]
    fn drops_oldest_bytes() {
        let mut tail = Vec::new();
        push_tail(&mut tail, b"first\n", 8);
        push_tail(&mut tail, b"second\n", 8);
        assert_eq!(tail, b"\nsecond\n");
    }

    #[test]
    fn oversized_chunk_keeps_its_end() {
        let mut tail = b"old".to_vec();
        push_tail(&mut tail, b"0123456789", 4);
        assert_eq!(tail, b"6789");
    }

    #[test]
    fn never_starts_mid_character() {
        // "é" is two bytes; the cut leaves its continuation byte first.
        let mut tail = Vec::new();
        push_tail(&mut tail, "ééé\n".as_bytes(), 4);
        assert_eq!(into_text(&tail), "é\n");
    }

    #[tokio::test]
    async fn pump_reads_until_eof() {
        let input: &[u8] = b"one\ntwo\nthree";
        let out = pump(input, "stdout", true, 1024).await;
        assert_eq!(out, "one\ntwo\nthree");
    }

    #[tokio::test]
    async fn invalid_utf8_does_not_stop_the_pump() {
        let mut input = vec![0xff, 0xfe, b'\n'];
        input.extend_from_slice(b"after\n");
        let out = pump(input.as_slice(), "stdout", true, 1024).await;
        assert!(out.ends_with("after\n"));
        assert!(out.contains('\u{fffd}'));
    }

    #[tokio::test]
    async fn long_line_without_newline_is_bounded() {
        let input = vec![b'a'; 1024 * 1024];
        let out = pump(input.as_slice(), "stdout", true, 4096).await;
        assert_eq!(out.len(), 4096);
        assert!(out.bytes().all(|b| b == b'a'));
    }
}
