//! Route and route-direction identity types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Maximum length accepted for a route number.
const MAX_ROUTE_LEN: usize = 8;

/// A validated route number, as shown on the front of the bus.
///
/// Route numbers are short uppercase alphanumeric strings such as `"33"`,
/// `"N2"` or `"701XS"`. Input is trimmed and uppercased before validation.
///
/// # Examples
///
/// ```
/// use bus_tracker::domain::RouteNo;
///
/// let route = RouteNo::parse(" mt4 ").unwrap();
/// assert_eq!(route.as_str(), "MT4");
///
/// assert!(RouteNo::parse("").is_err());
/// assert!(RouteNo::parse("3/3").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RouteNo(String);

impl RouteNo {
    /// Parse a route number.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let route = s.trim().to_ascii_uppercase();

        if route.is_empty() {
            return Err(DomainError::InvalidRoute {
                route,
                reason: "must not be empty",
            });
        }

        if route.len() > MAX_ROUTE_LEN {
            return Err(DomainError::InvalidRoute {
                route,
                reason: "too long",
            });
        }

        if !route.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(DomainError::InvalidRoute {
                route,
                reason: "must be ASCII letters and digits",
            });
        }

        Ok(RouteNo(route))
    }

    /// Returns the route number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The zero-padded five character route code used by the location endpoint.
    ///
    /// ```
    /// use bus_tracker::domain::RouteNo;
    ///
    /// assert_eq!(RouteNo::parse("33").unwrap().padded_code(), "00033");
    /// assert_eq!(RouteNo::parse("N2").unwrap().padded_code(), "000N2");
    /// assert_eq!(RouteNo::parse("701XS").unwrap().padded_code(), "701XS");
    /// ```
    pub fn padded_code(&self) -> String {
        format!("{:0>5}", self.0)
    }
}

impl fmt::Debug for RouteNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RouteNo({})", self.0)
    }
}

impl fmt::Display for RouteNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RouteNo {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RouteNo::parse(&value)
    }
}

impl From<RouteNo> for String {
    fn from(route: RouteNo) -> Self {
        route.0
    }
}

/// Direction of travel along a route.
///
/// The upstream service only knows two directions, encoded as `"0"` and `"1"`.
/// Circular routes usually only have direction `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    /// Both directions, in fetch order.
    pub const BOTH: [Direction; 2] = [Direction::Outbound, Direction::Inbound];

    /// Parse the upstream direction flag.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.trim() {
            "0" => Ok(Direction::Outbound),
            "1" => Ok(Direction::Inbound),
            other => Err(DomainError::InvalidDirection(other.to_string())),
        }
    }

    /// The direction flag as sent to the upstream service.
    pub fn as_param(&self) -> &'static str {
        match self {
            Direction::Outbound => "0",
            Direction::Inbound => "1",
        }
    }

    /// The other direction.
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Outbound => Direction::Inbound,
            Direction::Inbound => Direction::Outbound,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

impl TryFrom<String> for Direction {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Direction::parse(&value)
    }
}

impl From<Direction> for String {
    fn from(direction: Direction) -> Self {
        direction.as_param().to_string()
    }
}

/// One traversal direction of a numbered route.
///
/// Serialized as `"{route}_{direction}"`, e.g. `"33_0"`, which is also the
/// key used in the persisted graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RouteKey {
    pub route: RouteNo,
    pub direction: Direction,
}

impl RouteKey {
    /// Create a key from its parts.
    pub fn new(route: RouteNo, direction: Direction) -> Self {
        Self { route, direction }
    }

    /// The same route in the other direction.
    pub fn opposite(&self) -> Self {
        Self {
            route: self.route.clone(),
            direction: self.direction.opposite(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.route, self.direction)
    }
}

impl FromStr for RouteKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (route, direction) = s
            .rsplit_once('_')
            .ok_or_else(|| DomainError::InvalidRouteKey(s.to_string()))?;

        Ok(RouteKey {
            route: RouteNo::parse(route)?,
            direction: Direction::parse(direction)?,
        })
    }
}

impl TryFrom<String> for RouteKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RouteKey> for String {
    fn from(key: RouteKey) -> Self {
        key.to_string()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any valid route survives the key round trip in both directions.
        #[test]
        fn key_roundtrip(route in "[A-Z0-9]{1,8}", inbound in any::<bool>()) {
            let direction = if inbound { Direction::Inbound } else { Direction::Outbound };
            let key = RouteKey::new(RouteNo::parse(&route).unwrap(), direction);
            let parsed: RouteKey = key.to_string().parse().unwrap();
            prop_assert_eq!(parsed, key);
        }
    }
}
