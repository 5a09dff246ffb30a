//! Small nom grammars for the textual fragments that appear in source schema directives: type
//! references and field sets.

use crate::schema::field_set::{FieldSet, FieldSetItem};
use crate::schema::TypeRef;
use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::char;
use nom::combinator::{all_consuming, map, opt, recognize};
use nom::multi::many1;
use nom::sequence::{delimited, pair};
use nom::{Finish, IResult};

/// Whitespace and commas are insignificant in GraphQL.
fn ignored(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_whitespace() || c == ',')(input)
}

fn token<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(ignored, inner, ignored)
}

pub(crate) fn name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c == '_' || c.is_ascii_alphabetic()),
        take_while(|c: char| c == '_' || c.is_ascii_alphanumeric()),
    ))(input)
}

fn type_ref(input: &str) -> IResult<&str, TypeRef> {
    let (input, base) = alt((
        map(
            delimited(token(char('[')), type_ref, token(char(']'))),
            TypeRef::list,
        ),
        map(token(name), |name: &str| TypeRef::named(name)),
    ))(input)?;
    let (input, bang) = opt(token(char('!')))(input)?;
    Ok((input, if bang.is_some() { base.non_null() } else { base }))
}

fn field_set_item(input: &str) -> IResult<&str, FieldSetItem> {
    let (input, field_name) = token(name)(input)?;
    let (input, selections) = opt(braced_items)(input)?;
    Ok((
        input,
        FieldSetItem {
            name: field_name.into(),
            selections: FieldSet::from_items(selections.unwrap_or_default()),
        },
    ))
}

fn braced_items(input: &str) -> IResult<&str, Vec<FieldSetItem>> {
    delimited(token(char('{')), many1(field_set_item), token(char('}')))(input)
}

fn describe_failure(source: &str, error: nom::error::Error<&str>) -> String {
    if error.input.is_empty() {
        format!("unexpected end of input in \"{source}\"")
    } else {
        format!("unexpected input \"{}\" in \"{source}\"", error.input)
    }
}

pub(crate) fn parse_type_ref(source: &str) -> Result<TypeRef, String> {
    all_consuming(type_ref)(source)
        .finish()
        .map(|(_, parsed)| parsed)
        .map_err(|error| describe_failure(source, error))
}

/// Parses a field set such as `id sku { upc }`. Surrounding braces are accepted.
pub(crate) fn parse_field_set(source: &str) -> Result<FieldSet, String> {
    all_consuming(alt((braced_items, many1(field_set_item))))(source)
        .finish()
        .map(|(_, items)| FieldSet::from_items(items))
        .map_err(|error| describe_failure(source, error))
}
