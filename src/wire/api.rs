use std::ops::RangeInclusive;

use crate::wire::error::ErrorCode;
use crate::wire::WireSize;

macro_rules! repr_enum {
    (
        $repr:ty;
        $vis:vis enum $name:ident {
            $($v:ident = $i:literal,)+
        }
    ) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        #[repr($repr)]
        $vis enum $name {
            $($v = $i,)+
        }

        impl TryFrom<$repr> for $name {
            type Error = ErrorCode;

            fn try_from(value: $repr) -> Result<Self, Self::Error> {
                match value {
                    $($i => Ok($name::$v),)+
                    _ => Err(ErrorCode::InvalidRequest),
                }
            }
        }
    };
}

repr_enum! { i16;
    pub enum ApiKey {
        Produce = 0,
        Consume = 1,
        ProduceStream = 2,
        ConsumeStream = 3,
    }
}

impl ApiKey {
    /// Return the range of supported versions for this API.
    #[inline]
    pub(crate) fn api_versions(&self) -> RangeInclusive<ApiVersion> {
        match self {
            Self::Produce | Self::Consume | Self::ProduceStream | Self::ConsumeStream => {
                ApiVersion(0)..=ApiVersion(0)
            }
        }
    }

    /// The authorization action a request for this API must be permitted.
    #[inline]
    pub fn action(&self) -> &'static str {
        match self {
            Self::Produce | Self::ProduceStream => "produce",
            Self::Consume | Self::ConsumeStream => "consume",
        }
    }
}

impl WireSize for ApiKey {
    // INT16 repr
    const SIZE: usize = 2;

    #[inline]
    fn wire_size(&self) -> usize {
        Self::SIZE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ApiVersion(i16);

impl ApiVersion {
    pub fn parse(key: ApiKey, version: i16) -> Result<Self, ErrorCode> {
        let version = ApiVersion(version);
        if key.api_versions().contains(&version) {
            Ok(version)
        } else {
            Err(ErrorCode::UnsupportedVersion)
        }
    }

    #[inline]
    pub fn into_inner(self) -> i16 {
        self.0
    }
}
