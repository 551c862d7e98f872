//! Slash notation for categories: `NP[sg]/N[sg]`, `(S\NP)/NP`, `($X\$X)/$X`.

use nom::{
    branch::alt,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{all_consuming, map, opt, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded},
    IResult,
};
use ccg_protocol::{Features, VarId};
use thiserror::Error;

use crate::category::{Category, Slash};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    #[error("malformed category notation `{input}`")]
    Malformed { input: String },
    #[error("unknown feature `{feature}` in `{input}`")]
    UnknownFeature { feature: String, input: String },
}

/// Category as written, before variable names are numbered.
#[derive(Debug, Clone)]
enum Node<'a> {
    Atom(&'a str, Vec<&'a str>),
    Var(&'a str),
    Slashed(Box<Node<'a>>, Slash, Box<Node<'a>>),
}

fn slash(input: &str) -> IResult<&str, Slash> {
    alt((
        value(Slash::Forward, char('/')),
        value(Slash::Backward, char('\\')),
    ))(input)
}

fn atom(input: &str) -> IResult<&str, Node<'_>> {
    map(
        pair(
            alpha1,
            opt(delimited(
                char('['),
                separated_list1(char(','), delimited(multispace0, alphanumeric1, multispace0)),
                char(']'),
            )),
        ),
        |(base, features)| Node::Atom(base, features.unwrap_or_default()),
    )(input)
}

fn primary(input: &str) -> IResult<&str, Node<'_>> {
    delimited(
        multispace0,
        alt((
            delimited(char('('), category, char(')')),
            map(preceded(char('$'), alphanumeric1), Node::Var),
            atom,
        )),
        multispace0,
    )(input)
}

/// Slashes associate to the left: `X/Y/Z` is `(X/Y)/Z`.
fn category(input: &str) -> IResult<&str, Node<'_>> {
    let (input, first) = primary(input)?;
    let (input, rest) = many0(pair(slash, primary))(input)?;
    let folded = rest.into_iter().fold(first, |acc, (s, arg)| {
        Node::Slashed(Box::new(acc), s, Box::new(arg))
    });
    Ok((input, folded))
}

fn lower<'a>(node: &Node<'a>, names: &mut Vec<&'a str>, input: &str) -> Result<Category, CategoryError> {
    match node {
        Node::Atom(base, feature_names) => {
            let mut features = Features::empty();
            for name in feature_names {
                let feature = Features::from_short_name(name).ok_or_else(|| CategoryError::UnknownFeature {
                    feature: name.to_string(),
                    input: input.to_string(),
                })?;
                features |= feature;
            }
            Ok(Category::atom_with(base, features))
        }
        Node::Var(name) => {
            let position = match names.iter().position(|n| n == name) {
                Some(p) => p,
                None => {
                    names.push(*name);
                    names.len() - 1
                }
            };
            Ok(Category::Var(VarId::new(position as u32)))
        }
        Node::Slashed(result, slash, arg) => {
            let result = lower(result, names, input)?;
            let arg = lower(arg, names, input)?;
            Ok(Category::Complex {
                result: Box::new(result),
                slash: *slash,
                arg: Box::new(arg),
            })
        }
    }
}

/// Parses a category; variables are numbered from zero in order of appearance.
pub fn parse_category(input: &str) -> Result<Category, CategoryError> {
    let (_, node) = all_consuming(category)(input).map_err(|_| CategoryError::Malformed {
        input: input.to_string(),
    })?;
    let mut names = Vec::new();
    lower(&node, &mut names, input)
}

impl std::str::FromStr for Category {
    type Err = CategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_category(s)
    }
}
