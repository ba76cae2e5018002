//! Token counting

/// Measures text in model tokens
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Lexical approximation of a subword tokenizer.
///
/// Identifiers count one token per camelCase / snake_case piece, digit runs
/// count as one, and every other non-whitespace character counts as one.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalTokenCounter;

impl TokenCounter for LexicalTokenCounter {
    fn count(&self, text: &str) -> usize {
        let mut count = 0;
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            if c.is_whitespace() {
                continue;
            }

            if c.is_alphabetic() || c == '_' {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                count += identifier_pieces(&word);
            } else if c.is_ascii_digit() {
                while chars.peek().is_some_and(|n| n.is_ascii_alphanumeric() || *n == '.') {
                    chars.next();
                }
                count += 1;
            } else {
                count += 1;
            }
        }

        count
    }
}

fn identifier_pieces(word: &str) -> usize {
    word.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut pieces = 1;
            let mut prev: Option<char> = None;
            for c in part.chars() {
                if let Some(p) = prev {
                    if c.is_uppercase() && (p.is_lowercase() || p.is_ascii_digit()) {
                        pieces += 1;
                    }
                }
                prev = Some(c);
            }
            pieces
        })
        .sum::<usize>()
        .max(1)
}
