use archmind_context::{DEFAULT_SEPARATORS, TextSplitter};
use clap::Parser;
use serde::Serialize;
use std::fs;
use std::io::{self, Read};

/// A CLI tool to split text files into JSON chunk output using archmind-context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Maximum size in bytes for each chunk.
    #[arg(short = 's', long, default_value_t = 1000)]
    chunk_size: usize,

    /// Number of bytes carried over between consecutive chunks.
    #[arg(short = 'o', long, default_value_t = 200)]
    chunk_overlap: usize,

    /// Comma-separated list of separators, tried in order.
    /// Defaults to paragraph, line, space, and per-character splitting.
    #[arg(short = 'd', long, value_delimiter = ',')]
    separators: Option<Vec<String>>,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let file_content = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let separators: Vec<String> = args
        .separators
        .unwrap_or_else(|| DEFAULT_SEPARATORS.iter().map(|&s| s.to_string()).collect());

    let splitter = TextSplitter::with_separators(args.chunk_size, args.chunk_overlap, separators);
    let chunks = splitter.split(&file_content);

    #[derive(Serialize)]
    struct SerializableChunk<'a> {
        index: usize,
        length: usize,
        content: &'a str,
    }

    let serializable_chunks: Vec<SerializableChunk> = chunks
        .iter()
        .enumerate()
        .map(|(index, content)| SerializableChunk {
            index,
            length: content.len(),
            content,
        })
        .collect();

    let json_output = serde_json::to_string_pretty(&serializable_chunks)?;
    println!("{}", json_output);

    Ok(())
}
