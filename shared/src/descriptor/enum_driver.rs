use std::fmt;

/// An application enum that travels on the wire as a signed 32-bit value
pub trait WireEnum: Copy + 'static {
    /// Name used by the driver built from this enum
    const NAME: &'static str;
    /// Every variant with its wire value
    const VARIANTS: &'static [(&'static str, i32)];
    /// Wire value of the variant a slot starts with
    const INIT: i32;

    fn to_wire(self) -> i32;
    fn from_wire(value: i32) -> Option<Self>;
}

/// Table mapping the variants of a driven enum field to wire values
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumDriver {
    name: String,
    items: Vec<(String, i32)>,
    init: i32,
}

impl EnumDriver {
    pub fn new<'a>(
        name: impl Into<String>,
        items: impl IntoIterator<Item = (&'a str, i32)>,
        init: i32,
    ) -> Self {
        Self {
            name: name.into(),
            items: items
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
            init,
        }
    }

    pub fn of<E: WireEnum>() -> Self {
        Self::new(E::NAME, E::VARIANTS.iter().copied(), E::INIT)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn init_value(&self) -> i32 {
        self.init
    }

    pub fn is_valid(&self, value: i32) -> bool {
        self.items.iter().any(|(_, item)| *item == value)
    }

    pub fn name_of(&self, value: i32) -> Option<&str> {
        self.items
            .iter()
            .find(|(_, item)| *item == value)
            .map(|(name, _)| name.as_str())
    }

    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.items
            .iter()
            .find(|(item, _)| item == name)
            .map(|(_, value)| *value)
    }
}

/// State of a method, carried by the `method_state_<name>` field of an object
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum MethodState {
    #[default]
    NotSupported,
    Enabled,
    Disabled,
}

impl WireEnum for MethodState {
    const NAME: &'static str = "method_state";
    const VARIANTS: &'static [(&'static str, i32)] = &[
        ("NOT_SUPPORTED", 0),
        ("ENABLED", 1),
        ("DISABLED", 2),
    ];
    const INIT: i32 = 0;

    fn to_wire(self) -> i32 {
        match self {
            Self::NotSupported => 0,
            Self::Enabled => 1,
            Self::Disabled => 2,
        }
    }

    fn from_wire(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::NotSupported),
            1 => Some(Self::Enabled),
            2 => Some(Self::Disabled),
            _ => None,
        }
    }
}

impl fmt::Display for MethodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotSupported => "NOT_SUPPORTED",
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
        };
        f.write_str(name)
    }
}
