//! Line-oriented drain of a command's output

use super::invocation::CommandInvocation;
use crate::transport::StreamReader;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Read `input` line by line into `invocation` until end of stream or until
/// the invocation completes.
///
/// Bytes are decoded as Latin-1, so every byte is one character and nothing
/// is rejected. Both `\n` and `\r\n` end a line.
pub async fn drain_lines(input: StreamReader, invocation: Arc<CommandInvocation>) -> io::Result<()> {
    let mut reader = BufReader::new(input);
    let mut line = Vec::new();

    while !invocation.is_completed() {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if invocation.is_completed() {
            break;
        }

        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        let text: String = line.iter().map(|&b| char::from(b)).collect();
        invocation.append_line(&text);
    }
    Ok(())
}
