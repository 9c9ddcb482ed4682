use rand::Rng;

use super::{GenContext, Generator};
use crate::datasets::{domains, locations, names};
use crate::error::{Error, Result};
use crate::value::Value;

/// Generates random lowercase text of a length in `[min_len, max_len]`,
/// unless `chars` is set, in which case it's used verbatim as the
/// character pool to draw from (the "chars shortcut" populous' `Text`
/// generator supports for e.g. generating digit strings).
#[derive(Debug)]
pub struct TextGen {
    pub min_len: usize,
    pub max_len: usize,
    pub chars: Option<String>,
}

impl Generator for TextGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        if self.min_len > self.max_len {
            return Err(Error::generation(format!(
                "Text generator min_len ({}) is greater than max_len ({})",
                self.min_len, self.max_len
            )));
        }
        let len = ctx.rng.random_range(self.min_len..=self.max_len);
        let pool: Vec<char> = match &self.chars {
            Some(chars) => chars.chars().collect(),
            None => ('a'..='z').collect(),
        };
        if pool.is_empty() {
            return Err(Error::generation("Text generator character pool is empty"));
        }
        let s: String = (0..len)
            .map(|_| pool[ctx.rng.random_range(0..pool.len())])
            .collect();
        Ok(Value::Str(s))
    }
}

/// `words` lorem-ipsum words joined with spaces.
#[derive(Debug)]
pub struct LoremGen {
    pub words: usize,
}

impl Generator for LoremGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let text: Vec<&str> = (0..self.words)
            .map(|_| domains::LOREM_WORDS[ctx.rng.random_range(0..domains::LOREM_WORDS.len())])
            .collect();
        Ok(Value::Str(text.join(" ")))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Gender {
    Male,
    Female,
    Any,
}

/// A given name, optionally constrained by gender.
#[derive(Debug)]
pub struct FirstNameGen {
    pub gender: Gender,
}

impl Generator for FirstNameGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        // The retrieved dataset isn't split by gender; `gender` narrows
        // nothing here but is threaded through so a richer dataset can
        // honor it without changing the generator's shape.
        let _ = self.gender;
        let idx = ctx.rng.random_range(0..names::FIRST_NAMES.len());
        Ok(Value::Str(names::FIRST_NAMES[idx].to_string()))
    }
}

#[derive(Debug)]
pub struct LastNameGen;

impl Generator for LastNameGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let idx = ctx.rng.random_range(0..names::LAST_NAMES.len());
        Ok(Value::Str(names::LAST_NAMES[idx].to_string()))
    }
}

/// `First Last`, optionally constrained by gender.
#[derive(Debug)]
pub struct FullNameGen {
    pub gender: Gender,
}

impl Generator for FullNameGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let first = FirstNameGen { gender: self.gender }.generate(ctx)?;
        let last = LastNameGen.generate(ctx)?;
        Ok(Value::Str(format!("{} {}", first.as_str().unwrap_or(""), last.as_str().unwrap_or(""))))
    }
}

/// `first.last<index>@domain`, index folded in so output stays unique
/// without needing the `unique` wrapper for the common case.
#[derive(Debug)]
pub struct EmailGen;

impl Generator for EmailGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let first = names::FIRST_NAMES[ctx.rng.random_range(0..names::FIRST_NAMES.len())]
            .to_lowercase();
        let last =
            names::LAST_NAMES[ctx.rng.random_range(0..names::LAST_NAMES.len())].to_lowercase();
        let domain = domains::EMAIL_DOMAINS[ctx.rng.random_range(0..domains::EMAIL_DOMAINS.len())];
        Ok(Value::Str(format!(
            "{first}.{last}{}@{domain}",
            ctx.index
        )))
    }
}

#[derive(Debug)]
pub struct CityGen;

impl Generator for CityGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let idx = ctx.rng.random_range(0..locations::CITIES.len());
        Ok(Value::Str(locations::CITIES[idx].to_string()))
    }
}

#[derive(Debug)]
pub struct AddressGen;

impl Generator for AddressGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let num: u16 = ctx.rng.random_range(1..9999);
        let first = names::FIRST_NAMES[ctx.rng.random_range(0..names::FIRST_NAMES.len())];
        let suffix = locations::STREET_SUFFIXES
            [ctx.rng.random_range(0..locations::STREET_SUFFIXES.len())];
        Ok(Value::Str(format!("{num} {first} {suffix}")))
    }
}

#[derive(Debug)]
pub struct JobTitleGen;

impl Generator for JobTitleGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let idx = ctx.rng.random_range(0..names::JOB_TITLES.len());
        Ok(Value::Str(names::JOB_TITLES[idx].to_string()))
    }
}

#[derive(Debug)]
pub struct CompanyGen;

impl Generator for CompanyGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let last = names::LAST_NAMES[ctx.rng.random_range(0..names::LAST_NAMES.len())];
        let suffix =
            domains::COMPANY_SUFFIXES[ctx.rng.random_range(0..domains::COMPANY_SUFFIXES.len())];
        Ok(Value::Str(format!("{last} {suffix}")))
    }
}

/// A dotted IPv4 address.
#[derive(Debug)]
pub struct IpAddressGen;

impl Generator for IpAddressGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let octets: Vec<String> = (0..4).map(|_| ctx.rng.random_range(0u8..=255).to_string()).collect();
        Ok(Value::Str(octets.join(".")))
    }
}

/// An `https://` URL built from a random domain and path segment.
#[derive(Debug)]
pub struct UrlGen;

impl Generator for UrlGen {
    fn generate(&self, ctx: &mut GenContext<'_>) -> Result<Value> {
        let domain = domains::EMAIL_DOMAINS[ctx.rng.random_range(0..domains::EMAIL_DOMAINS.len())];
        let slug = domains::LOREM_WORDS[ctx.rng.random_range(0..domains::LOREM_WORDS.len())];
        Ok(Value::Str(format!("https://{domain}/{slug}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ctx(rng: &mut StdRng) -> GenContext<'_> {
        GenContext { rng, index: 3 }
    }

    #[test]
    fn email_contains_at_and_index_suffix() {
        let mut rng = StdRng::seed_from_u64(42);
        let g = EmailGen;
        match g.generate(&mut ctx(&mut rng)).unwrap() {
            Value::Str(s) => {
                assert!(s.contains('@'));
                assert!(s.contains('3'));
            }
            other => panic!("expected Str, got {other:?}"),
        }
    }

    #[test]
    fn text_respects_custom_char_pool() {
        let mut rng = StdRng::seed_from_u64(42);
        let g = TextGen {
            min_len: 8,
            max_len: 8,
            chars: Some("0123456789".to_string()),
        };
        match g.generate(&mut ctx(&mut rng)).unwrap() {
            Value::Str(s) => {
                assert_eq!(s.len(), 8);
                assert!(s.chars().all(|c| c.is_ascii_digit()));
            }
            other => panic!("expected Str, got {other:?}"),
        }
    }

    #[test]
    fn lorem_word_count_matches() {
        let mut rng = StdRng::seed_from_u64(42);
        let g = LoremGen { words: 6 };
        match g.generate(&mut ctx(&mut rng)).unwrap() {
            Value::Str(s) => assert_eq!(s.split(' ').count(), 6),
            other => panic!("expected Str, got {other:?}"),
        }
    }

    #[test]
    fn ip_address_has_four_octets() {
        let mut rng = StdRng::seed_from_u64(42);
        let g = IpAddressGen;
        match g.generate(&mut ctx(&mut rng)).unwrap() {
            Value::Str(s) => assert_eq!(s.split('.').count(), 4),
            other => panic!("expected Str, got {other:?}"),
        }
    }
}
