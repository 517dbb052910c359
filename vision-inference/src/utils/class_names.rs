use std::borrow::Cow;
use std::collections::BTreeMap;
use std::iter;

/// Index to label mapping carried in a detector's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassNames(BTreeMap<usize, String>);

impl ClassNames {
    /// Parse the Python dict literal written by Ultralytics exports,
    /// e.g. `{0: 'car', 1: "stop sign"}`. Malformed trailing entries are ignored.
    pub fn parse(raw: &str) -> Self {
        let body = raw.trim().trim_start_matches('{').trim_end_matches('}');
        let mut chars = body.chars().peekable();
        let mut names = BTreeMap::new();

        loop {
            while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}

            let key: String = iter::from_fn(|| chars.next_if(char::is_ascii_digit)).collect();
            if key.is_empty() {
                break;
            }

            while chars.next_if(|c| c.is_whitespace() || *c == ':').is_some() {}

            let Some(quote) = chars.next_if(|c| *c == '\'' || *c == '"') else {
                break;
            };

            let mut value = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    c if c == quote => break,
                    c => value.push(c),
                }
            }

            if let Ok(index) = key.parse() {
                names.insert(index, value);
            }
        }

        Self(names)
    }

    pub fn label(&self, index: usize) -> Cow<'_, str> {
        match self.0.get(&index) {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(format!("cls_{index}")),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(usize, S)> for ClassNames {
    fn from_iter<T: IntoIterator<Item = (usize, S)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(index, name)| (index, name.into())).collect())
    }
}
