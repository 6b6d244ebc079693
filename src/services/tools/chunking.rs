// Recursive character chunker, matching `DocumentProcessor`'s
// `RecursiveCharacterTextSplitter(chunk_size=1000, chunk_overlap=200,
// separators=["\n\n", "\n", "。", ".", " ", ""])`: try the coarsest separator
// first, recurse into any piece still too large with the next separator, then
// greedily merge adjacent pieces into ~`chunk_size`-character chunks with
// `chunk_overlap` characters of trailing context carried into the next chunk.

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
const SEPARATORS: &[&str] = &["\n\n", "\n", "。", ".", " ", ""];

pub fn chunk_text(text: &str) -> Vec<String> {
    chunk_text_with(text, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
}

pub fn chunk_text_with(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let pieces = split_recursive(text, SEPARATORS, chunk_size);
    merge_pieces(&pieces, chunk_size, chunk_overlap)
}

fn split_recursive(text: &str, separators: &[&str], chunk_size: usize) -> Vec<String> {
    let Some((separator, rest)) = separators.split_first() else {
        return vec![text.to_string()];
    };

    let parts: Vec<&str> = if separator.is_empty() {
        text.split("").filter(|s| !s.is_empty()).collect()
    } else {
        text.split(*separator).collect()
    };

    let mut out = Vec::new();
    for part in parts {
        if part.is_empty() {
            continue;
        }
        if part.chars().count() > chunk_size && !rest.is_empty() {
            out.extend(split_recursive(part, rest, chunk_size));
        } else {
            out.push(part.to_string());
        }
    }
    out
}

fn merge_pieces(pieces: &[String], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        let candidate_len = current.chars().count() + piece.chars().count();
        if !current.is_empty() && candidate_len > chunk_size {
            chunks.push(current.clone());
            current = tail(&current, chunk_overlap);
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(piece);
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
}

fn tail(s: &str, max_chars: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_chars {
        s.to_string()
    } else {
        chars[chars.len() - max_chars..].iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("   ").is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("just a short sentence.");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn long_text_is_split_into_multiple_chunks() {
        let paragraph = "word ".repeat(400); // ~2000 chars
        let chunks = chunk_text_with(&paragraph, 1000, 200);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1000 + 200);
        }
    }
}
