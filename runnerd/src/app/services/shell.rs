// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

/// Very small, safe-ish shell escaper.
pub fn sh_escape(p: &str) -> String {
    let mut out = String::from("'");
    out.push_str(&p.replace('\'', r"'\''"));
    out.push('\'');
    out
}

fn is_plain_word(word: &str) -> bool {
    !word.is_empty()
        && word
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./=:,@%+".contains(&b))
}

/// Join words into one command line, quoting only the words that need it.
pub fn join_words<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|word| {
            let word = word.as_ref();
            if is_plain_word(word) {
                word.to_string()
            } else {
                sh_escape(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sh_escape_wraps_and_escapes_quotes() {
        assert_eq!(sh_escape("plain"), "'plain'");
        assert_eq!(sh_escape("a'b"), "'a'\\''b'");
    }

    #[test]
    fn join_words_quotes_only_when_needed() {
        let line = join_words(&["qsub", "-l", "walltime=1:00:00,mem=4gb", "-F", "u1 s1 out", ""]);
        assert_eq!(line, "qsub -l walltime=1:00:00,mem=4gb -F 'u1 s1 out' ''");
    }
}
