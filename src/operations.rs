//! Semantic chamber operations, all built on [`ChamberClient::read`] and
//! [`ChamberClient::write`].

use tracing::warn;

use crate::client::{ChamberClient, Error};
use crate::record::{Outcome, StateRecord};
use crate::transport::Transport;
use crate::value::Value;

/// Set points are sent to the controller multiplied by this.
pub const SET_POINT_MULTIPLIER: f64 = 1000.0;
/// Lighting levels in `0..=1` are sent to the controller multiplied by this.
pub const LIGHTING_MULTIPLIER: f64 = 1000.0;

const LIGHTING_CHANNELS: [&str; 7] = [
    "lighting_1",
    "lighting_2",
    "lighting_3",
    "lighting_4",
    "lighting_5",
    "lighting_6",
    "lighting_7",
];

/// The parameters polled for the aggregate chamber state.
pub const STATE_PARAMETERS: [&str; 21] = [
    "co2_actual",
    "co2_target",
    "humidity_actual",
    "humidity_target",
    "humidification_enabled",
    "dehumidification_enabled",
    "lighting_1",
    "lighting_2",
    "lighting_3",
    "lighting_4",
    "lighting_5",
    "lighting_6",
    "lighting_7",
    "temperature_actual",
    "temperature_target",
    "air_diverter_state",
    "watering_actual",
    "watering_target",
    "door_state",
    "curtain_state",
    "operating_mode",
];

/// A readable group of chamber parameters.
#[derive(clap::ValueEnum, strum::Display, Clone, Copy, Debug, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum Subsystem {
    Temperature,
    Humidity,
    Co2,
    Watering,
    Lighting,
    Door,
    Curtain,
    AirDiverter,
    Mode,
    Clock,
    /// Everything above, but the clock.
    State,
}

impl Subsystem {
    pub fn parameters(self) -> &'static [&'static str] {
        match self {
            Subsystem::Temperature => &["temperature_actual", "temperature_target"],
            Subsystem::Humidity => &[
                "humidity_actual",
                "humidity_target",
                "humidification_enabled",
                "dehumidification_enabled",
            ],
            Subsystem::Co2 => &["co2_actual", "co2_target"],
            Subsystem::Watering => &["watering_actual", "watering_target"],
            Subsystem::Lighting => &[
                "lighting_1",
                "lighting_2",
                "lighting_3",
                "lighting_4",
                "lighting_5",
                "lighting_6",
                "lighting_7",
                "light_meter",
            ],
            Subsystem::Door => &["door_state"],
            Subsystem::Curtain => &["curtain_state"],
            Subsystem::AirDiverter => &["air_diverter_state"],
            Subsystem::Mode => &["operating_mode"],
            Subsystem::Clock => &["hour", "minute", "second"],
            Subsystem::State => &STATE_PARAMETERS,
        }
    }
}

/// A control loop with a writable set point.
#[derive(clap::ValueEnum, strum::Display, Clone, Copy, Debug, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum SetPoint {
    Temperature,
    Humidity,
    Co2,
    Watering,
}

impl SetPoint {
    pub fn parameter(self) -> &'static str {
        match self {
            SetPoint::Temperature => "temperature_target",
            SetPoint::Humidity => "humidity_target",
            SetPoint::Co2 => "co2_target",
            SetPoint::Watering => "watering_target",
        }
    }
}

/// A single `On`/`Off` output of the controller.
#[derive(clap::ValueEnum, strum::Display, Clone, Copy, Debug, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum Switch {
    Door,
    Curtain,
    AirDiverter,
}

impl Switch {
    pub fn parameter(self) -> &'static str {
        match self {
            Switch::Door => "door_state",
            Switch::Curtain => "curtain_state",
            Switch::AirDiverter => "air_diverter_state",
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn on_off(self) -> Value {
        match self {
            Toggle::On => Value::from("On"),
            Toggle::Off => Value::from("Off"),
        }
    }

    fn yes_no(self) -> Value {
        match self {
            Toggle::On => Value::from("Yes"),
            Toggle::Off => Value::from("No"),
        }
    }
}

impl<T: Transport> ChamberClient<T> {
    /// Read a group of parameters. The clock is returned as integers without bookkeeping.
    pub async fn get(&self, subsystem: Subsystem) -> Result<Outcome, Error> {
        match subsystem {
            Subsystem::Clock => self.get_time().await,
            other => self.read(other.parameters()).await,
        }
    }

    pub async fn set_point(&self, set_point: SetPoint, value: f64) -> Result<Outcome, Error> {
        if !value.is_finite() {
            return Err(Error::NonFiniteSetPoint(value));
        }
        let scaled = Value::Int((value * SET_POINT_MULTIPLIER).round() as i64);
        self.write(&[(set_point.parameter(), scaled)]).await
    }

    pub async fn switch(&self, switch: Switch, state: Toggle) -> Result<Outcome, Error> {
        self.write(&[(switch.parameter(), state.on_off())]).await
    }

    // Temperature.

    pub async fn get_temperature(&self) -> Result<Outcome, Error> {
        self.get(Subsystem::Temperature).await
    }

    pub async fn set_temperature(&self, temperature: f64) -> Result<Outcome, Error> {
        self.set_point(SetPoint::Temperature, temperature).await
    }

    // Humidity.

    pub async fn get_humidity(&self) -> Result<Outcome, Error> {
        self.get(Subsystem::Humidity).await
    }

    pub async fn set_humidity(&self, level: f64) -> Result<Outcome, Error> {
        self.set_point(SetPoint::Humidity, level).await
    }

    /// Enable both humidification and dehumidification, then report the humidity state.
    pub async fn enable_humidity(&self) -> Result<Outcome, Error> {
        if self.humidity_control(Toggle::On).await?.is_connection_error() {
            return Ok(Outcome::ConnectionError);
        }
        self.get_humidity().await
    }

    /// Disable both humidification and dehumidification, e.g. to keep water off equipment
    /// working inside the chamber.
    pub async fn disable_humidity(&self) -> Result<Outcome, Error> {
        self.humidity_control(Toggle::Off).await
    }

    async fn humidity_control(&self, state: Toggle) -> Result<Outcome, Error> {
        self.write(&[("CLC_Enable_Rh_1", state.yes_no()), ("CLC_Enable_Rh_2", state.yes_no())])
            .await
    }

    // CO2.

    pub async fn get_co2(&self) -> Result<Outcome, Error> {
        self.get(Subsystem::Co2).await
    }

    pub async fn set_co2(&self, level: f64) -> Result<Outcome, Error> {
        self.set_point(SetPoint::Co2, level).await
    }

    // Watering.

    pub async fn get_watering(&self) -> Result<Outcome, Error> {
        self.get(Subsystem::Watering).await
    }

    pub async fn set_watering(&self, level: f64) -> Result<Outcome, Error> {
        self.set_point(SetPoint::Watering, level).await
    }

    // Lighting.

    pub async fn get_lighting(&self) -> Result<Outcome, Error> {
        self.get(Subsystem::Lighting).await
    }

    /// Set all seven lighting channels to `level`, a fraction in `0..=1`.
    ///
    /// Only the dim levels are sent. The `lighting_N_on` switches are left alone; a level of
    /// zero is enough to turn the channels dark.
    pub async fn set_lighting(&self, level: f64) -> Result<Outcome, Error> {
        if !(0.0..=1.0).contains(&level) {
            return Err(Error::LightingLevelOutOfRange(level));
        }
        let scaled = (level * LIGHTING_MULTIPLIER).round() as i64;
        let values = LIGHTING_CHANNELS.map(|channel| (channel, Value::Int(scaled)));
        self.write(&values).await
    }

    // Door, curtain, air diverter.

    pub async fn open_door(&self) -> Result<Outcome, Error> {
        self.switch(Switch::Door, Toggle::On).await
    }

    pub async fn close_door(&self) -> Result<Outcome, Error> {
        self.switch(Switch::Door, Toggle::Off).await
    }

    pub async fn get_door(&self) -> Result<Outcome, Error> {
        self.get(Subsystem::Door).await
    }

    pub async fn open_curtain(&self) -> Result<Outcome, Error> {
        self.switch(Switch::Curtain, Toggle::On).await
    }

    pub async fn close_curtain(&self) -> Result<Outcome, Error> {
        self.switch(Switch::Curtain, Toggle::Off).await
    }

    pub async fn get_curtain(&self) -> Result<Outcome, Error> {
        self.get(Subsystem::Curtain).await
    }

    pub async fn turn_on_air_diverter(&self) -> Result<Outcome, Error> {
        self.switch(Switch::AirDiverter, Toggle::On).await
    }

    pub async fn turn_off_air_diverter(&self) -> Result<Outcome, Error> {
        self.switch(Switch::AirDiverter, Toggle::Off).await
    }

    pub async fn get_air_diverter(&self) -> Result<Outcome, Error> {
        self.get(Subsystem::AirDiverter).await
    }

    // Mode. Setting the mode lives with the client, it uses a separate endpoint.

    pub async fn get_mode(&self) -> Result<Outcome, Error> {
        self.get(Subsystem::Mode).await
    }

    // Clock.

    pub async fn get_time(&self) -> Result<Outcome, Error> {
        let outcome = self.read(Subsystem::Clock.parameters()).await?;
        Ok(outcome.map(|mut record| {
            record.strip_bookkeeping();
            integral_values(&mut record);
            record
        }))
    }

    /// Set the controller clock to the local wall clock time.
    pub async fn set_time(&self) -> Result<Outcome, Error> {
        let now = jiff::Zoned::now();
        self.set_time_to(now.hour(), now.minute(), now.second()).await
    }

    pub async fn set_time_to(&self, hour: i8, minute: i8, second: i8) -> Result<Outcome, Error> {
        self.write(&[
            ("Real_Time_Hour", Value::Int(hour.into())),
            ("Real_Time_Minute", Value::Int(minute.into())),
            ("Real_Time_Second", Value::Int(second.into())),
        ])
        .await
    }

    // Everything.

    pub async fn get_state(&self) -> Result<Outcome, Error> {
        self.get(Subsystem::State).await
    }
}

fn integral_values(record: &mut StateRecord) {
    for (parameter, value) in record.values.iter_mut() {
        match value.as_i64() {
            Some(n) => *value = Value::Int(n),
            None => warn!(
                chamber_id = record.chamber_id,
                parameter = %parameter,
                ?value,
                "clock value is not a number"
            ),
        }
    }
}
