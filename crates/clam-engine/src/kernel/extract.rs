use super::OptionMap;

/// Collects the tunable options declared by `sources`.
///
/// A line `#ifndef NAME` declares option `NAME`; a line `#define NAME value`
/// supplies its default, but only for names some source declares. Options
/// are ordered by first declaration, file order then line order.
pub fn extract_options<S: AsRef<str>>(sources: &[S]) -> OptionMap {
    let mut options = OptionMap::default();
    for source in sources {
        for line in source.as_ref().lines() {
            if let Some(name) = ifndef_line(line) {
                options.declare(name);
            }
        }
    }
    for source in sources {
        for line in source.as_ref().lines() {
            if let Some((name, value)) = define_line(line) {
                options.set_default(name, value);
            }
        }
    }
    options
}

/// Matches `#ifndef +NAME\r?` with nothing else on the line.
fn ifndef_line(line: &str) -> Option<&str> {
    let rest = line.strip_suffix('\r').unwrap_or(line);
    let name = after_spaces(rest.strip_prefix("#ifndef")?)?;
    is_word(name).then_some(name)
}

/// Matches `#define +NAME +VALUE\r?` and returns `(NAME, VALUE)`.
fn define_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_suffix('\r').unwrap_or(line);
    let rest = after_spaces(rest.strip_prefix("#define")?)?;
    let name_len = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
    let (name, rest) = rest.split_at(name_len);
    if name.is_empty() {
        return None;
    }
    // Trailing blanks would otherwise turn a default into an invalid define.
    let value = after_spaces(rest)?.trim_end();
    (!value.is_empty()).then_some((name, value))
}

/// Strips one or more leading spaces; `None` if there were none.
fn after_spaces(s: &str) -> Option<&str> {
    let trimmed = s.trim_start_matches(' ');
    (trimmed.len() < s.len()).then_some(trimmed)
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_word_char)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
