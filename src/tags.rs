//! The chamber controller's tag vocabulary and its mapping onto parameter names.
//!
//! The controller exposes every value as a "tag" (`PV_1`, `EO_3_Dim`, `CM_SP_2_Manual`, ...).
//! This module holds the one authoritative table translating these into stable, human readable
//! parameter names (`temperature_actual`, `lighting_3`, `humidity_target`, ...) and back, plus
//! the rules deciding how the textual payload of each tag is to be decoded.

/// How the textual payload of a tag is encoded by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
pub enum Encoding {
    /// `*_Dim` tags: an integer, optionally followed by a `%` sign (`"450 %"`).
    DimPercent,
    /// `*_On_Off` tags: literal `"On"`, anything else is off.
    OnOff,
    /// A number possibly followed by a unit (`"22.5 C"`), or `"Yes"`/`"No"`.
    ScaledFloat,
    /// Free form text, kept as-is.
    Raw,
}

impl Encoding {
    // Short aliases for the tabulated `for_each_tag` definition below.
    const DIM: Self = Self::DimPercent;
    const ONOFF: Self = Self::OnOff;
    const FLOAT: Self = Self::ScaledFloat;
    const RAW: Self = Self::Raw;

    /// Infer the encoding from the tag's suffix alone.
    pub fn from_suffix(tag: &str) -> Self {
        if tag.ends_with("_Dim") {
            Self::DimPercent
        } else if tag.ends_with("_On_Off") {
            Self::OnOff
        } else {
            Self::ScaledFloat
        }
    }
}

impl serde::Serialize for Encoding {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.into())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct Mode(u8);

impl serde::Serialize for Mode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.0 & Self::R.0 == 0 { "-" } else { "R" })?;
        f.write_str(if self.0 & Self::W.0 == 0 { "-" } else { "W" })?;
        Ok(())
    }
}

impl Mode {
    pub const R: Self = Self(1 << 0);
    pub const W: Self = Self(1 << 1);
    pub const RW: Self = Self(Self::R.0 | Self::W.0);
    const R_: Self = Self::R;

    pub fn is_writable(&self) -> bool {
        self.0 & Self::W.0 != 0
    }
}

/// A handle to a single entry of the tag dictionary.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TagIndex(usize);

impl TagIndex {
    pub fn from_tag(tag: &str) -> Option<TagIndex> {
        TAGS.iter().position(|v| *v == tag).map(Self)
    }

    pub fn from_parameter(parameter: &str) -> Option<TagIndex> {
        PARAMETERS.iter().position(|v| *v == parameter).map(Self)
    }

    pub fn all() -> impl Iterator<Item = TagIndex> {
        (0..TAGS.len()).map(Self)
    }

    pub fn tag(&self) -> &'static str {
        TAGS[self.0]
    }

    pub fn parameter(&self) -> &'static str {
        PARAMETERS[self.0]
    }

    pub fn mode(&self) -> Mode {
        MODES[self.0]
    }

    pub fn encoding(&self) -> Encoding {
        ENCODINGS[self.0]
    }

    pub fn description(&self) -> &'static str {
        DESCRIPTIONS[self.0]
    }
}

/// Parameter name for a controller tag, `None` for tags outside of the dictionary.
pub fn normalize(tag: &str) -> Option<&'static str> {
    TagIndex::from_tag(tag).map(|i| i.parameter())
}

/// Controller tag for a parameter name, `None` if the name is not a known parameter.
pub fn denormalize(parameter: &str) -> Option<&'static str> {
    TagIndex::from_parameter(parameter).map(|i| i.tag())
}

/// [`denormalize`], but names that aren't parameters are assumed to already be controller tags.
pub fn denormalize_or_passthrough(name: &str) -> &str {
    denormalize(name).unwrap_or(name)
}

/// Decide how the payload of `tag` is encoded.
///
/// The `_Dim` and `_On_Off` suffixes are shared by many tags, so these are matched by suffix
/// regardless of whether the tag is in the dictionary. Other dictionary entries may declare
/// themselves free form text; everything else is a (possibly unit-suffixed) number.
pub fn classify(tag: &str) -> Encoding {
    match Encoding::from_suffix(tag) {
        Encoding::ScaledFloat => match TagIndex::from_tag(tag) {
            Some(index) => index.encoding(),
            None => Encoding::ScaledFloat,
        },
        other => other,
    }
}

macro_rules! for_each_tag {
    ($m:ident) => {
        $m! {
            // Sensor readings.
            "PV_1" => "temperature_actual", R_, FLOAT, "Chamber temperature, °C (sensor range 0-50)";
            "PV_2" => "humidity_actual", R_, FLOAT, "Relative humidity, %RH (sensor range 0-100)";
            "PV_3" => "co2_actual", R_, FLOAT, "CO2 concentration, PPM (sensor range 0-5000)";
            // The original table registered `PV_4` twice, first as `lighting_sensor` and then as
            // `light_meter`. Only the latter ever took effect and is what downstream logs contain.
            "PV_4" => "light_meter", R_, FLOAT, "PAR light sensor, UML (monitoring only)";
            "PV_5" => "watering_actual", R_, FLOAT, "Volumetric water content, %WC";
            // Set points.
            "CM_SP_1_Manual" => "temperature_target", RW, FLOAT, "Temperature set point, °C x1000";
            "CM_SP_2_Manual" => "humidity_target", RW, FLOAT, "Relative humidity set point, %RH x1000";
            "CM_SP_3_Manual" => "co2_target", RW, FLOAT, "CO2 set point, PPM x1000";
            "CM_SP_5_Manual" => "watering_target", RW, FLOAT, "Water content set point, %WC x1000";
            // Lighting.
            "EO_1_On_Off" => "lighting_1_on", RW, ONOFF, "Lighting channel 1 switch";
            "EO_2_On_Off" => "lighting_2_on", RW, ONOFF, "Lighting channel 2 switch";
            "EO_1_Dim" => "lighting_1", RW, DIM, "Lighting channel 1 intensity";
            "EO_2_Dim" => "lighting_2", RW, DIM, "Lighting channel 2 intensity";
            "EO_3_Dim" => "lighting_3", RW, DIM, "Lighting channel 3 intensity";
            "EO_4_Dim" => "lighting_4", RW, DIM, "Lighting channel 4 intensity";
            "EO_5_Dim" => "lighting_5", RW, DIM, "Lighting channel 5 intensity";
            "EO_6_Dim" => "lighting_6", RW, DIM, "Lighting channel 6 intensity";
            "EO_7_Dim" => "lighting_7", RW, DIM, "Lighting channel 7 intensity";
            // Humidity control loop.
            "CLC_Enable_Rh_1" => "humidification_enabled", RW, FLOAT, "Humidification enabled (Yes/No)";
            "CLC_Enable_Rh_2" => "dehumidification_enabled", RW, FLOAT, "Dehumidification enabled (Yes/No)";
            // Door and friends.
            "EO_13_On_Off" => "door_state", RW, ONOFF, "Door open";
            "EO_14_On_Off" => "air_diverter_state", RW, ONOFF, "Air diverter engaged";
            "EO_15_On_Off" => "curtain_state", RW, ONOFF, "Curtain open";
            // Operating mode. Written through the ramping endpoint, not through this tag.
            "CM_NON_RAMPING_MODE" => "operating_mode", R_, RAW, "Current operating mode of the controller";
            // Controller clock.
            "Real_Time_Hour" => "hour", RW, FLOAT, "Controller clock, hour";
            "Real_Time_Minute" => "minute", RW, FLOAT, "Controller clock, minute";
            "Real_Time_Second" => "second", RW, FLOAT, "Controller clock, second";
        }
    };
}

macro_rules! make_lists {
    ($($tag: literal => $parameter: literal, $mode: ident, $encoding: ident, $description: literal;)+) => {
        pub static TAGS: &[&str] = &[$($tag),*];
        pub static PARAMETERS: &[&str] = &[$($parameter),*];
        pub static MODES: &[Mode] = &[$(Mode::$mode),*];
        pub static ENCODINGS: &[Encoding] = &[$(Encoding::$encoding),*];
        pub static DESCRIPTIONS: &[&str] = &[$($description),*];
    };
}

for_each_tag!(make_lists);

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut index = 0;
    while index < a.len() {
        if a[index] != b[index] {
            return false;
        }
        index += 1;
    }
    true
}

const fn has_duplicates(list: &[&str]) -> bool {
    let mut i = 0;
    while i < list.len() {
        let mut j = i + 1;
        while j < list.len() {
            if str_eq(list[i], list[j]) {
                return true;
            }
            j += 1;
        }
        i += 1;
    }
    false
}

const _: () = {
    if has_duplicates(TAGS) {
        panic!("TAGS contains duplicate entries!");
    }
    if has_duplicates(PARAMETERS) {
        panic!("PARAMETERS contains duplicate entries!");
    }
};
