use std::io::Write;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

type Input = Box<dyn AsyncBufRead + Send + Unpin>;

/// Line-oriented terminal input
pub struct Console {
    lines: Lines<Input>,
}

impl Console {
    pub fn new() -> Self {
        Self::from_reader(BufReader::new(io::stdin()))
    }

    pub fn from_reader(reader: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        let input: Input = Box::new(reader);
        Self { lines: input.lines() }
    }

    /// Next line, `None` at end of input. Cancel safe.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }

    /// Print `label` without a newline and read the answer
    pub async fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        print!("{}", label);
        std::io::stdout().flush()?;
        self.next_line().await
    }
}
