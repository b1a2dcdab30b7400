//! Expiry parsing with reference-time layouts.
//!
//! A layout spells the reference instant `Mon Jan 2 15:04:05 MST 2006` in the
//! shape of the expected value (`2006-01-02T15:04:05Z07:00`). Each recognized
//! token becomes a [`time`] format item; everything else must match literally.

// std
use std::num::NonZeroU8;
// crates.io
use time::{
	Date, Month, PrimitiveDateTime, Time, UtcOffset,
	format_description::{self, OwnedFormatItem},
	parsing::Parsed,
};
// self
use crate::{_prelude::*, error::CredentialsError};

/// Symbolic layout names accepted in `expiry_format`, with their layouts.
pub const NAMED_LAYOUTS: [(&str, &str); 13] = [
	("Layout", "01/02 03:04:05PM '06 -0700"),
	("ANSIC", "Mon Jan _2 15:04:05 2006"),
	("UnixDate", "Mon Jan _2 15:04:05 MST 2006"),
	("RubyDate", "Mon Jan 02 15:04:05 -0700 2006"),
	("RFC822", "02 Jan 06 15:04 MST"),
	("RFC822Z", "02 Jan 06 15:04 -0700"),
	("RFC850", "Monday, 02-Jan-06 15:04:05 MST"),
	("RFC1123", "Mon, 02 Jan 2006 15:04:05 MST"),
	("RFC1123Z", "Mon, 02 Jan 2006 15:04:05 -0700"),
	("RFC3339", "2006-01-02T15:04:05Z07:00"),
	("RFC3339Nano", "2006-01-02T15:04:05.999999999Z07:00"),
	("Kitchen", "3:04PM"),
	("DateOnly", "2006-01-02"),
];

/// Compiled expiry layout.
#[derive(Clone, Debug)]
pub struct ExpiryLayout {
	source: String,
	steps: Vec<Step>,
}
impl ExpiryLayout {
	/// Compiles a symbolic layout name or a literal reference-time pattern.
	pub fn new(format: &str) -> Result<Self, CredentialsError> {
		let pattern = NAMED_LAYOUTS
			.iter()
			.find_map(|(name, layout)| (*name == format).then_some(*layout))
			.unwrap_or(format);
		let steps = compile(pattern).map_err(|reason| CredentialsError::InvalidExpiryLayout {
			layout: format.into(),
			reason,
		})?;

		Ok(Self { source: format.into(), steps })
	}

	/// Parses `value` against the layout.
	///
	/// Absent date parts default to January 1 of year 0, absent time parts to
	/// midnight, and an absent or abbreviated zone to UTC.
	pub fn parse(&self, value: &str) -> Result<OffsetDateTime, CredentialsError> {
		let fail = |reason: String| CredentialsError::InvalidExpiry {
			value: value.into(),
			layout: self.source.clone(),
			reason,
		};
		let mut parsed = Parsed::new();
		let mut offset = None;
		let mut rest = value.as_bytes();

		for (i, step) in self.steps.iter().enumerate() {
			rest = match step {
				Step::Literal(literal) => match_literal(literal, rest)
					.ok_or_else(|| fail(format!("expected `{literal}`")))?,
				Step::Item(item) => parse_item(&mut parsed, rest, item).map_err(fail)?,
				Step::UnderDay(item) => {
					let rest = rest.strip_prefix(b" ").unwrap_or(rest);

					parse_item(&mut parsed, rest, item).map_err(fail)?
				},
				Step::Second { item, fraction } => {
					let rest = parse_item(&mut parsed, rest, item).map_err(fail)?;
					let next_is_fraction = matches!(
						self.steps.get(i + 1),
						Some(Step::Fraction(_) | Step::OptionalFraction(_))
					);

					if next_is_fraction {
						rest
					} else {
						parse_fraction(&mut parsed, rest, fraction).map_err(fail)?
					}
				},
				Step::Fraction(item) => match rest.split_first() {
					Some((&(b'.' | b','), tail)) => parse_item(&mut parsed, tail, item).map_err(fail)?,
					_ => return Err(fail("expected fractional seconds".into())),
				},
				Step::OptionalFraction(item) => parse_fraction(&mut parsed, rest, item).map_err(fail)?,
				Step::ZoneAbbrev => {
					let len = rest.iter().take_while(|b| b.is_ascii_uppercase()).count();

					if !(3..=5).contains(&len) {
						return Err(fail("expected a time zone abbreviation".into()));
					}

					&rest[len..]
				},
				Step::Offset { item, allow_z } => {
					if *allow_z && rest.first() == Some(&b'Z') {
						&rest[1..]
					} else {
						let negative = rest.first() == Some(&b'-');
						let rest = parse_item(&mut parsed, rest, item).map_err(fail)?;

						offset = Some(negative);

						rest
					}
				},
			};
		}

		if !rest.is_empty() {
			return Err(fail(format!("unexpected trailing text `{}`", String::from_utf8_lossy(rest))));
		}

		assemble(&parsed, offset).map_err(fail)
	}
}

/// Parses an expiry `value` written in `format` (symbolic name or literal layout).
pub fn parse_expiry(value: &str, format: &str) -> Result<OffsetDateTime, CredentialsError> {
	ExpiryLayout::new(format)?.parse(value)
}

#[derive(Clone, Debug)]
enum Step {
	Literal(String),
	Item(OwnedFormatItem),
	UnderDay(OwnedFormatItem),
	Second { item: OwnedFormatItem, fraction: OwnedFormatItem },
	Fraction(OwnedFormatItem),
	OptionalFraction(OwnedFormatItem),
	ZoneAbbrev,
	Offset { item: OwnedFormatItem, allow_z: bool },
}

enum Token {
	Item(&'static str),
	UnderDay,
	Second(&'static str),
	Fraction { digits: usize },
	OptionalFraction,
	ZoneAbbrev,
	Offset { description: &'static str, allow_z: bool },
}

fn compile(layout: &str) -> Result<Vec<Step>, String> {
	let bytes = layout.as_bytes();
	let mut steps = Vec::new();
	let mut literal = String::new();
	let mut i = 0;

	while i < bytes.len() {
		let Some((token, len)) = next_token(&bytes[i..]) else {
			let ch = layout[i..].chars().next().unwrap_or_default();

			literal.push(ch);

			i += ch.len_utf8().max(1);

			continue;
		};

		if !literal.is_empty() {
			steps.push(Step::Literal(std::mem::take(&mut literal)));
		}

		steps.push(match token {
			Token::Item(description) => Step::Item(describe(description)?),
			Token::UnderDay => Step::UnderDay(describe("[day padding:none]")?),
			Token::Second(description) => Step::Second {
				item: describe(description)?,
				fraction: describe(FRACTION_ANY)?,
			},
			Token::Fraction { digits } =>
				Step::Fraction(describe(&format!("[subsecond digits:{}]", digits.min(9)))?),
			Token::OptionalFraction => Step::OptionalFraction(describe(FRACTION_ANY)?),
			Token::ZoneAbbrev => Step::ZoneAbbrev,
			Token::Offset { description, allow_z } =>
				Step::Offset { item: describe(description)?, allow_z },
		});

		i += len;
	}

	if !literal.is_empty() {
		steps.push(Step::Literal(literal));
	}

	Ok(steps)
}

fn describe(description: &str) -> Result<OwnedFormatItem, String> {
	format_description::parse_owned::<1>(description).map_err(|e| e.to_string())
}

fn next_token(s: &[u8]) -> Option<(Token, usize)> {
	let starts = |prefix: &str| s.starts_with(prefix.as_bytes());

	Some(match s.first()? {
		b'J' if starts("January") => (Token::Item("[month repr:long case_sensitive:false]"), 7),
		b'J' if starts("Jan") => (Token::Item("[month repr:short case_sensitive:false]"), 3),
		b'M' if starts("Monday") => (Token::Item("[weekday repr:long case_sensitive:false]"), 6),
		b'M' if starts("Mon") => (Token::Item("[weekday repr:short case_sensitive:false]"), 3),
		b'M' if starts("MST") => (Token::ZoneAbbrev, 3),
		b'0' => match s.get(1)? {
			b'1' => (Token::Item("[month]"), 2),
			b'2' => (Token::Item("[day]"), 2),
			b'3' => (Token::Item("[hour repr:12]"), 2),
			b'4' => (Token::Item("[minute]"), 2),
			b'5' => (Token::Second("[second]"), 2),
			b'6' => (Token::Item("[year repr:last_two]"), 2),
			_ => return None,
		},
		b'1' if starts("15") => (Token::Item("[hour padding:none]"), 2),
		b'1' => (Token::Item("[month padding:none]"), 1),
		b'2' if starts("2006") => (Token::Item("[year]"), 4),
		b'2' => (Token::Item("[day padding:none]"), 1),
		b'_' if starts("_2") && !starts("_2006") => (Token::UnderDay, 2),
		b'3' => (Token::Item("[hour repr:12 padding:none]"), 1),
		b'4' => (Token::Item("[minute padding:none]"), 1),
		b'5' => (Token::Second("[second padding:none]"), 1),
		b'P' if starts("PM") => (Token::Item("[period case:upper case_sensitive:false]"), 2),
		b'p' if starts("pm") => (Token::Item("[period case:lower case_sensitive:false]"), 2),
		b'-' if starts("-07:00") => (Token::Offset { description: OFFSET_COLON, allow_z: false }, 6),
		b'-' if starts("-0700") => (Token::Offset { description: OFFSET_PLAIN, allow_z: false }, 5),
		b'-' if starts("-07") => (Token::Offset { description: OFFSET_HOUR, allow_z: false }, 3),
		b'Z' if starts("Z07:00") => (Token::Offset { description: OFFSET_COLON, allow_z: true }, 6),
		b'Z' if starts("Z0700") => (Token::Offset { description: OFFSET_PLAIN, allow_z: true }, 5),
		b'Z' if starts("Z07") => (Token::Offset { description: OFFSET_HOUR, allow_z: true }, 3),
		b'.' | b',' => {
			let digit = *s.get(1)?;

			if digit != b'0' && digit != b'9' {
				return None;
			}

			let run = s[1..].iter().take_while(|b| **b == digit).count();

			if s.get(1 + run).is_some_and(u8::is_ascii_digit) {
				return None;
			}
			if digit == b'9' {
				(Token::OptionalFraction, 1 + run)
			} else {
				(Token::Fraction { digits: run }, 1 + run)
			}
		},
		_ => return None,
	})
}

const FRACTION_ANY: &str = "[subsecond digits:1+]";
const OFFSET_COLON: &str = "[offset_hour sign:mandatory]:[offset_minute]";
const OFFSET_PLAIN: &str = "[offset_hour sign:mandatory][offset_minute]";
const OFFSET_HOUR: &str = "[offset_hour sign:mandatory]";

fn parse_item<'a>(
	parsed: &mut Parsed,
	input: &'a [u8],
	item: &OwnedFormatItem,
) -> Result<&'a [u8], String> {
	parsed.parse_item(input, item).map_err(|e| e.to_string())
}

// Fractional seconds the layout does not spell out are still accepted after seconds.
fn parse_fraction<'a>(
	parsed: &mut Parsed,
	input: &'a [u8],
	item: &OwnedFormatItem,
) -> Result<&'a [u8], String> {
	match input {
		[b'.' | b',', digit, ..] if digit.is_ascii_digit() => parse_item(parsed, &input[1..], item),
		_ => Ok(input),
	}
}

fn assemble(parsed: &Parsed, offset: Option<bool>) -> Result<OffsetDateTime, String> {
	let year = parsed
		.year()
		.or_else(|| {
			parsed.year_last_two().map(|yy| {
				let yy = i32::from(yy);

				if yy >= 69 { 1900 + yy } else { 2000 + yy }
			})
		})
		.unwrap_or(0);
	let month = parsed.month().unwrap_or(Month::January);
	let day = parsed.day().map_or(1, NonZeroU8::get);
	let hour = match (parsed.hour_24(), parsed.hour_12()) {
		(Some(hour), _) => hour,
		(None, Some(hour)) => hour.get() % 12 + if parsed.hour_12_is_pm() == Some(true) { 12 } else { 0 },
		(None, None) => 0,
	};
	let date = Date::from_calendar_date(year, month, day).map_err(|e| e.to_string())?;
	let time = Time::from_hms_nano(
		hour,
		parsed.minute().unwrap_or(0),
		parsed.second().unwrap_or(0),
		parsed.subsecond().unwrap_or(0),
	)
	.map_err(|e| e.to_string())?;
	let offset = match offset {
		Some(negative) => {
			let sign = if negative { -1 } else { 1 };
			let hours = parsed.offset_hour().unwrap_or(0).unsigned_abs() as i8;
			let minutes = parsed.offset_minute_signed().unwrap_or(0).unsigned_abs() as i8;

			UtcOffset::from_hms(sign * hours, sign * minutes, 0).map_err(|e| e.to_string())?
		},
		None => UtcOffset::UTC,
	};

	Ok(PrimitiveDateTime::new(date, time).assume_offset(offset))
}

// A space in the layout matches any run of spaces in the input, including none at the end.
fn match_literal<'a>(literal: &str, mut input: &'a [u8]) -> Option<&'a [u8]> {
	let mut expected = literal.as_bytes();

	while let Some((&first, tail)) = expected.split_first() {
		if first == b' ' {
			if input.first().is_some_and(|b| *b != b' ') {
				return None;
			}

			expected = trim_spaces(expected);
			input = trim_spaces(input);

			continue;
		}

		input = input.strip_prefix(&[first])?;
		expected = tail;
	}

	Some(input)
}

fn trim_spaces(s: &[u8]) -> &[u8] {
	let n = s.iter().take_while(|b| **b == b' ').count();

	&s[n..]
}
