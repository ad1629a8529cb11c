//! The [`Target`] trait: the I/O surface the driver needs from the program
//! under test, and [`StreamTarget`], which provides it over any pair of
//! async streams.

use crate::config::{LineEnding, RunConfig};
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

/// The program being driven.
///
/// Reads return `Ok(None)` once the program's output has ended.
#[async_trait]
pub trait Target: Send {
    /// Read up to a line terminator, which is stripped along with a
    /// preceding `\r`.
    async fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Read at most `max_chars` characters of an unterminated prompt,
    /// stopping early when no more data arrives.
    async fn read_prompt(&mut self, max_chars: usize) -> io::Result<Option<String>>;

    /// Send one line of input, terminator appended.
    async fn write_line(&mut self, text: &str) -> io::Result<()>;

    /// The script finished: let the program wind down.
    async fn shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// The run was stopped: end the program now.
    async fn terminate(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A [`Target`] over an output stream to read from and an input stream to
/// write to.
pub struct StreamTarget<R, W> {
    reader: BufReader<R>,
    writer: Option<W>,
    line_ending: LineEnding,
    prompt_idle: Duration,
}

impl<R, W> StreamTarget<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, &RunConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: &RunConfig) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: Some(writer),
            line_ending: config.line_ending,
            prompt_idle: config.prompt_idle,
        }
    }

    /// Close the input stream so the program sees end-of-file.
    pub async fn close_input(&mut self) -> io::Result<()> {
        match self.writer.take() {
            Some(mut writer) => writer.shutdown().await,
            None => Ok(()),
        }
    }

    /// Read one UTF-8 character; invalid sequences come back lossily.
    async fn read_char(&mut self) -> io::Result<Option<String>> {
        let first = match self.reader.read_u8().await {
            Ok(byte) => byte,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut bytes = vec![first];
        for _ in 1..utf8_width(first) {
            match self.reader.read_u8().await {
                Ok(byte) => bytes.push(byte),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Wait up to the idle interval for more output. `false` on silence or EOF.
    async fn more_data_soon(&mut self) -> io::Result<bool> {
        match timeout(self.prompt_idle, self.reader.fill_buf()).await {
            Err(_) => Ok(false),
            Ok(Err(e)) => Err(e),
            Ok(Ok(buf)) => Ok(!buf.is_empty()),
        }
    }
}

fn utf8_width(first: u8) -> usize {
    match first {
        0xF0..=0xF7 => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

#[async_trait]
impl<R, W> Target for StreamTarget<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    async fn read_prompt(&mut self, max_chars: usize) -> io::Result<Option<String>> {
        let mut text = String::new();
        let mut count = 0;
        while count < max_chars {
            // The first character is awaited like a line read; later ones
            // only while the program keeps producing output.
            if count > 0 && !self.more_data_soon().await? {
                break;
            }
            match self.read_char().await? {
                Some(c) => {
                    text.push_str(&c);
                    count += 1;
                }
                None => break,
            }
        }

        if count == 0 && max_chars > 0 {
            return Ok(None);
        }
        Ok(Some(text))
    }

    async fn write_line(&mut self, text: &str) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "input already closed"))?;
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(self.line_ending.as_str().as_bytes()).await?;
        writer.flush().await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.close_input().await
    }

    async fn terminate(&mut self) -> io::Result<()> {
        self.close_input().await
    }
}
