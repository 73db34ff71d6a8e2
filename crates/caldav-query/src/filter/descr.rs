//! Filter descriptions as supplied by clients.
//!
//! The XML layer hands over a generic [`FilterElement`] tree. Before
//! compilation that tree is converted once into the typed description nodes
//! ([`CompFilter`], [`PropFilter`], [`ParamFilter`]) so the compiler never has
//! to inspect element names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{FilterError, FilterResult};

/// Caseless ASCII collation identifier.
pub const COLLATION_ASCII_CASEMAP: &str = "i;ascii-casemap";

/// Octet-by-octet (case-sensitive) collation identifier.
pub const COLLATION_OCTET: &str = "i;octet";

/// A generic element of a parsed filter document.
///
/// Element and attribute names are the local names, without namespace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterElement {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<FilterElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl FilterElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: FilterElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn required_name(&self) -> FilterResult<String> {
        self.attribute("name")
            .map(str::to_string)
            .ok_or_else(|| {
                FilterError::bad_filter(format!("{} without a name attribute", self.name))
            })
    }
}

/// How sibling filters are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Test {
    #[default]
    AnyOf,
    AllOf,
}

impl Test {
    /// Reads a `test` attribute; anything other than `allof` is `anyof`.
    pub fn from_attribute(value: Option<&str>) -> Self {
        match value {
            Some("allof") => Test::AllOf,
            _ => Test::AnyOf,
        }
    }

    pub fn is_all_of(self) -> bool {
        self == Test::AllOf
    }
}

/// Raw `time-range` attributes, validated at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeRangeDescr {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

impl TimeRangeDescr {
    pub fn new(start: Option<&str>, end: Option<&str>) -> Self {
        Self {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        }
    }
}

fn default_collation() -> String {
    COLLATION_ASCII_CASEMAP.to_string()
}

/// A `text-match` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMatch {
    pub value: String,
    #[serde(default = "default_collation")]
    pub collation: String,
    #[serde(default)]
    pub negate: bool,
}

impl TextMatch {
    /// Creates a caseless, non-negated text match.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            collation: default_collation(),
            negate: false,
        }
    }

    pub fn with_collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = collation.into();
        self
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    /// Returns true for the caseless collation, false for the octet one.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::UnsupportedCollation` for any other collation.
    pub fn caseless(&self) -> FilterResult<bool> {
        match self.collation.as_str() {
            COLLATION_ASCII_CASEMAP => Ok(true),
            COLLATION_OCTET => Ok(false),
            other => Err(FilterError::unsupported_collation(other)),
        }
    }

    fn from_element(el: &FilterElement) -> FilterResult<Self> {
        let value = el
            .text
            .clone()
            .ok_or_else(|| FilterError::bad_filter("text-match without a value"))?;
        Ok(Self {
            value,
            collation: el
                .attribute("collation")
                .map(str::to_string)
                .unwrap_or_else(default_collation),
            negate: el.attribute("negate-condition") == Some("yes"),
        })
    }
}

/// A `param-filter` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamFilter {
    pub name: String,
    #[serde(default)]
    pub is_not_defined: bool,
    #[serde(default)]
    pub text_match: Option<TextMatch>,
}

impl ParamFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_not_defined: false,
            text_match: None,
        }
    }

    pub fn not_defined(mut self) -> Self {
        self.is_not_defined = true;
        self
    }

    pub fn with_text_match(mut self, text_match: TextMatch) -> Self {
        self.text_match = Some(text_match);
        self
    }

    fn from_element(el: &FilterElement) -> FilterResult<Self> {
        let mut filter = Self::new(el.required_name()?);
        for child in &el.children {
            match child.name.as_str() {
                "is-not-defined" => filter.is_not_defined = true,
                "text-match" => {
                    if filter.text_match.is_some() {
                        return Err(FilterError::bad_filter(
                            "param-filter with several text-match elements",
                        ));
                    }
                    filter.text_match = Some(TextMatch::from_element(child)?);
                }
                other => return Err(unexpected_child("param-filter", other)),
            }
        }
        Ok(filter)
    }
}

/// A `prop-filter` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropFilter {
    pub name: String,
    #[serde(default)]
    pub test: Test,
    #[serde(default)]
    pub is_not_defined: bool,
    #[serde(default)]
    pub time_range: Option<TimeRangeDescr>,
    #[serde(default)]
    pub text_match: Option<TextMatch>,
    #[serde(default)]
    pub param_filters: Vec<ParamFilter>,
}

impl PropFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            test: Test::AnyOf,
            is_not_defined: false,
            time_range: None,
            text_match: None,
            param_filters: Vec::new(),
        }
    }

    pub fn with_test(mut self, test: Test) -> Self {
        self.test = test;
        self
    }

    pub fn not_defined(mut self) -> Self {
        self.is_not_defined = true;
        self
    }

    pub fn with_time_range(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.time_range = Some(TimeRangeDescr::new(start, end));
        self
    }

    pub fn with_text_match(mut self, text_match: TextMatch) -> Self {
        self.text_match = Some(text_match);
        self
    }

    pub fn with_param_filter(mut self, param_filter: ParamFilter) -> Self {
        self.param_filters.push(param_filter);
        self
    }

    /// Returns true if the filter only tests for the property's existence.
    pub fn is_existence_check(&self) -> bool {
        !self.is_not_defined
            && self.time_range.is_none()
            && self.text_match.is_none()
            && self.param_filters.is_empty()
    }

    fn from_element(el: &FilterElement) -> FilterResult<Self> {
        let mut filter = Self::new(el.required_name()?);
        filter.test = Test::from_attribute(el.attribute("test"));
        for child in &el.children {
            match child.name.as_str() {
                "is-not-defined" => filter.is_not_defined = true,
                "time-range" => {
                    if filter.time_range.is_some() {
                        return Err(FilterError::bad_filter(
                            "prop-filter with several time-range elements",
                        ));
                    }
                    filter.time_range = Some(time_range_from_element(child));
                }
                "text-match" => {
                    if filter.text_match.is_some() {
                        return Err(FilterError::bad_filter(
                            "prop-filter with several text-match elements",
                        ));
                    }
                    filter.text_match = Some(TextMatch::from_element(child)?);
                }
                "param-filter" => filter.param_filters.push(ParamFilter::from_element(child)?),
                other => return Err(unexpected_child("prop-filter", other)),
            }
        }
        Ok(filter)
    }
}

/// A `comp-filter` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompFilter {
    pub name: String,
    #[serde(default)]
    pub test: Test,
    #[serde(default)]
    pub is_not_defined: bool,
    #[serde(default)]
    pub time_range: Option<TimeRangeDescr>,
    #[serde(default)]
    pub prop_filters: Vec<PropFilter>,
    #[serde(default)]
    pub comp_filters: Vec<CompFilter>,
}

impl CompFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            test: Test::AnyOf,
            is_not_defined: false,
            time_range: None,
            prop_filters: Vec::new(),
            comp_filters: Vec::new(),
        }
    }

    pub fn with_test(mut self, test: Test) -> Self {
        self.test = test;
        self
    }

    pub fn not_defined(mut self) -> Self {
        self.is_not_defined = true;
        self
    }

    pub fn with_time_range(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.time_range = Some(TimeRangeDescr::new(start, end));
        self
    }

    pub fn with_prop_filter(mut self, prop_filter: PropFilter) -> Self {
        self.prop_filters.push(prop_filter);
        self
    }

    pub fn with_comp_filter(mut self, comp_filter: CompFilter) -> Self {
        self.comp_filters.push(comp_filter);
        self
    }

    /// Returns true if the node has no time-range, no child comp-filters
    /// and no prop-filters.
    pub fn is_match_all(&self) -> bool {
        self.time_range.is_none() && self.comp_filters.is_empty() && self.prop_filters.is_empty()
    }

    /// Converts a parsed element tree into a typed description.
    ///
    /// Accepts either a `filter` element holding exactly one `comp-filter`,
    /// or a `comp-filter` element directly.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::BadFilter` for unknown elements, missing names,
    /// duplicated time-range/text-match elements, or an empty text-match.
    ///
    /// # Example
    ///
    /// ```
    /// use caldav_query::filter::{CompFilter, FilterElement};
    ///
    /// let element = FilterElement::new("filter").child(
    ///     FilterElement::new("comp-filter")
    ///         .attr("name", "VCALENDAR")
    ///         .child(FilterElement::new("comp-filter").attr("name", "VEVENT")),
    /// );
    /// let filter = CompFilter::from_element(&element).unwrap();
    /// assert_eq!(filter.comp_filters[0].name, "VEVENT");
    /// ```
    pub fn from_element(el: &FilterElement) -> FilterResult<Self> {
        match el.name.as_str() {
            "filter" => match el.children.as_slice() {
                [only] if only.name == "comp-filter" => Self::parse_comp_filter(only),
                _ => Err(FilterError::bad_filter(
                    "filter must contain exactly one comp-filter",
                )),
            },
            "comp-filter" => Self::parse_comp_filter(el),
            other => Err(FilterError::bad_filter(format!(
                "expected filter or comp-filter, found {other}"
            ))),
        }
    }

    fn parse_comp_filter(el: &FilterElement) -> FilterResult<Self> {
        let mut filter = Self::new(el.required_name()?);
        filter.test = Test::from_attribute(el.attribute("test"));
        for child in &el.children {
            match child.name.as_str() {
                "is-not-defined" => filter.is_not_defined = true,
                "time-range" => {
                    if filter.time_range.is_some() {
                        return Err(FilterError::bad_filter(
                            "comp-filter with several time-range elements",
                        ));
                    }
                    filter.time_range = Some(time_range_from_element(child));
                }
                "prop-filter" => filter.prop_filters.push(PropFilter::from_element(child)?),
                "comp-filter" => filter.comp_filters.push(Self::parse_comp_filter(child)?),
                other => return Err(unexpected_child("comp-filter", other)),
            }
        }
        Ok(filter)
    }
}

fn time_range_from_element(el: &FilterElement) -> TimeRangeDescr {
    TimeRangeDescr::new(el.attribute("start"), el.attribute("end"))
}

fn unexpected_child(parent: &str, child: &str) -> FilterError {
    FilterError::bad_filter(format!("unexpected {child} element inside {parent}"))
}
