//! Sensor-identifier decoding for each geometry family.
//!
//! Codecs are built once per scenario, when the catalog is loaded, so a codec
//! in hand always has every parameter its encoding mode needs. Decoding is
//! pure: no I/O and no dependence on the output tables.

use crate::domain::{EncodingMode, EncodingParam, EncodingParams, HarnessError, Scenario};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardLayout {
    pub board_ordering_divisor: i64,
    pub n_boards: i64,
    pub sipms_per_board: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub init_sns_id: Option<i64>,
    pub first_id_second_plane: i64,
    pub sipms_per_tile: i64,
}

impl PlaneLayout {
    /// Four tiles per plane.
    pub const fn max_sensors_per_plane(&self) -> i64 {
        self.sipms_per_tile * 4
    }

    /// Plane an id belongs to, without range validation.
    pub const fn plane_of(&self, sensor_id: i64) -> Plane {
        if sensor_id < self.first_id_second_plane {
            Plane::Near
        } else {
            Plane::Far
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Plane {
    Near,
    Far,
}

impl Plane {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Near => "near",
            Self::Far => "far",
        }
    }
}

impl Display for Plane {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedSensorId {
    Flat { index: i64 },
    Board { board: i64, offset: i64 },
    Plane { plane: Plane, local_id: i64 },
}

impl Display for DecodedSensorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flat { index } => write!(f, "index={}", index),
            Self::Board { board, offset } => write!(f, "board={} offset={}", board, offset),
            Self::Plane { plane, local_id } => write!(f, "plane={} local_id={}", plane, local_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecConfigError {
    #[error("encoding mode {mode} requires parameter '{}'", param.key())]
    MissingParam {
        mode: EncodingMode,
        param: EncodingParam,
    },
    #[error("parameter '{}' must be positive, found {value}", param.key())]
    NonPositiveParam { param: EncodingParam, value: i64 },
    #[error("encoding mode {mode} requires 'init_sns_id'")]
    MissingInitSensorId { mode: EncodingMode },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed {mode} sensor id {sensor_id}: {reason}")]
pub struct DecodeError {
    pub mode: EncodingMode,
    pub sensor_id: i64,
    pub reason: String,
}

impl From<DecodeError> for HarnessError {
    fn from(error: DecodeError) -> Self {
        HarnessError::computation("RUN.MALFORMED_SENSOR_ID", error.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorIdCodec {
    Flat { sensor_count: u32 },
    BoardPacked(BoardLayout),
    DualPlane(PlaneLayout),
    TilePacked(PlaneLayout),
}

impl SensorIdCodec {
    pub fn for_scenario(scenario: &Scenario) -> Result<Self, CodecConfigError> {
        Self::from_parts(
            scenario.encoding_mode,
            &scenario.encoding_params,
            scenario.init_sns_id,
            scenario.sensor_count,
        )
    }

    pub fn from_parts(
        mode: EncodingMode,
        params: &EncodingParams,
        init_sns_id: Option<i64>,
        sensor_count: u32,
    ) -> Result<Self, CodecConfigError> {
        let required = |param: EncodingParam| -> Result<i64, CodecConfigError> {
            let value = params
                .get(param)
                .ok_or(CodecConfigError::MissingParam { mode, param })?;
            if value <= 0 {
                return Err(CodecConfigError::NonPositiveParam { param, value });
            }
            Ok(value)
        };

        match mode {
            EncodingMode::Flat => Ok(Self::Flat { sensor_count }),
            EncodingMode::BoardPacked => Ok(Self::BoardPacked(BoardLayout {
                board_ordering_divisor: required(EncodingParam::BoardOrderingDivisor)?,
                n_boards: required(EncodingParam::NBoards)?,
                sipms_per_board: required(EncodingParam::SipmsPerBoard)?,
            })),
            EncodingMode::DualPlane | EncodingMode::TilePacked => {
                let layout = PlaneLayout {
                    init_sns_id,
                    sipms_per_tile: required(EncodingParam::SipmsPerTile)?,
                    first_id_second_plane: required(EncodingParam::FirstIdSecondPlane)?,
                };
                if mode == EncodingMode::DualPlane {
                    Ok(Self::DualPlane(layout))
                } else if init_sns_id.is_none() {
                    Err(CodecConfigError::MissingInitSensorId { mode })
                } else {
                    Ok(Self::TilePacked(layout))
                }
            }
        }
    }

    pub const fn mode(&self) -> EncodingMode {
        match self {
            Self::Flat { .. } => EncodingMode::Flat,
            Self::BoardPacked(_) => EncodingMode::BoardPacked,
            Self::DualPlane(_) => EncodingMode::DualPlane,
            Self::TilePacked(_) => EncodingMode::TilePacked,
        }
    }

    pub const fn plane_layout(&self) -> Option<&PlaneLayout> {
        match self {
            Self::DualPlane(layout) | Self::TilePacked(layout) => Some(layout),
            Self::Flat { .. } | Self::BoardPacked(_) => None,
        }
    }

    pub fn decode(&self, sensor_id: i64) -> Result<DecodedSensorId, DecodeError> {
        if sensor_id < 0 {
            return Err(self.malformed(sensor_id, "identifiers are non-negative"));
        }

        match self {
            // Flat ids carry no structure beyond the index; the simulator may
            // start numbering at an arbitrary offset.
            Self::Flat { .. } => Ok(DecodedSensorId::Flat { index: sensor_id }),
            Self::BoardPacked(layout) => self.decode_board(layout, sensor_id),
            Self::DualPlane(layout) | Self::TilePacked(layout) => {
                self.decode_plane(layout, sensor_id)
            }
        }
    }

    fn decode_board(
        &self,
        layout: &BoardLayout,
        sensor_id: i64,
    ) -> Result<DecodedSensorId, DecodeError> {
        let board = sensor_id / layout.board_ordering_divisor;
        let offset = sensor_id % layout.board_ordering_divisor;

        if !(1..=layout.n_boards).contains(&board) {
            return Err(self.malformed(
                sensor_id,
                format!("board {} outside [1, {}]", board, layout.n_boards),
            ));
        }
        if offset > layout.sipms_per_board {
            return Err(self.malformed(
                sensor_id,
                format!(
                    "board offset {} outside [0, {}]",
                    offset, layout.sipms_per_board
                ),
            ));
        }

        Ok(DecodedSensorId::Board { board, offset })
    }

    fn decode_plane(
        &self,
        layout: &PlaneLayout,
        sensor_id: i64,
    ) -> Result<DecodedSensorId, DecodeError> {
        if let Some(first_id) = layout.init_sns_id {
            if sensor_id < first_id {
                return Err(self.malformed(
                    sensor_id,
                    format!("below first sensor id {}", first_id),
                ));
            }
        }

        let plane = layout.plane_of(sensor_id);
        let local_id = match plane {
            Plane::Near => sensor_id - layout.init_sns_id.unwrap_or(0),
            Plane::Far => sensor_id - layout.first_id_second_plane,
        };
        Ok(DecodedSensorId::Plane { plane, local_id })
    }

    fn malformed(&self, sensor_id: i64, reason: impl Into<String>) -> DecodeError {
        DecodeError {
            mode: self.mode(),
            sensor_id,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BoardLayout, CodecConfigError, DecodedSensorId, Plane, PlaneLayout, SensorIdCodec,
    };
    use crate::domain::{EncodingMode, EncodingParam, EncodingParams};

    fn ring_tiles() -> SensorIdCodec {
        SensorIdCodec::BoardPacked(BoardLayout {
            board_ordering_divisor: 1000,
            n_boards: 120,
            sipms_per_board: 32,
        })
    }

    fn pet_box() -> SensorIdCodec {
        SensorIdCodec::TilePacked(PlaneLayout {
            init_sns_id: Some(11),
            first_id_second_plane: 111,
            sipms_per_tile: 16,
        })
    }

    #[test]
    fn board_packed_accepts_documented_boundaries() {
        let codec = ring_tiles();
        assert_eq!(
            codec.decode(1000).expect("first board start"),
            DecodedSensorId::Board {
                board: 1,
                offset: 0
            }
        );
        assert_eq!(
            codec.decode(120_032).expect("last board end"),
            DecodedSensorId::Board {
                board: 120,
                offset: 32
            }
        );
    }

    #[test]
    fn board_packed_rejects_ids_outside_every_board() {
        let codec = ring_tiles();
        for sensor_id in [999, 121_000, 5033, -1] {
            let error = codec
                .decode(sensor_id)
                .expect_err("id should be malformed");
            assert_eq!(error.mode, EncodingMode::BoardPacked);
            assert_eq!(error.sensor_id, sensor_id);
        }
    }

    #[test]
    fn planar_ids_split_at_the_second_plane_cut() {
        let codec = pet_box();
        assert_eq!(
            codec.decode(11).expect("first sensor"),
            DecodedSensorId::Plane {
                plane: Plane::Near,
                local_id: 0
            }
        );
        assert_eq!(
            codec.decode(110).expect("last near id"),
            DecodedSensorId::Plane {
                plane: Plane::Near,
                local_id: 99
            }
        );
        assert_eq!(
            codec.decode(111).expect("cut id belongs to far plane"),
            DecodedSensorId::Plane {
                plane: Plane::Far,
                local_id: 0
            }
        );
        assert!(codec.decode(10).is_err());
    }

    #[test]
    fn flat_ids_decode_to_their_index() {
        let codec = SensorIdCodec::Flat {
            sensor_count: 102_304,
        };
        assert_eq!(
            codec.decode(1000).expect("flat id"),
            DecodedSensorId::Flat { index: 1000 }
        );
        assert!(codec.decode(-5).is_err());
    }

    #[test]
    fn construction_reports_missing_and_non_positive_params() {
        let error = SensorIdCodec::from_parts(
            EncodingMode::BoardPacked,
            &EncodingParams {
                board_ordering_divisor: Some(1000),
                n_boards: Some(120),
                ..EncodingParams::default()
            },
            None,
            3840,
        )
        .expect_err("missing sipms_per_board");
        assert_eq!(
            error,
            CodecConfigError::MissingParam {
                mode: EncodingMode::BoardPacked,
                param: EncodingParam::SipmsPerBoard
            }
        );
        assert_eq!(
            error.to_string(),
            "encoding mode BOARD_PACKED requires parameter 'sipms_per_board'"
        );

        let error = SensorIdCodec::from_parts(
            EncodingMode::BoardPacked,
            &EncodingParams {
                board_ordering_divisor: Some(0),
                n_boards: Some(120),
                sipms_per_board: Some(32),
                ..EncodingParams::default()
            },
            None,
            3840,
        )
        .expect_err("zero divisor");
        assert!(matches!(error, CodecConfigError::NonPositiveParam { .. }));
    }

    #[test]
    fn tile_packed_requires_a_first_sensor_id() {
        let params = EncodingParams {
            sipms_per_tile: Some(64),
            first_id_second_plane: Some(111),
            ..EncodingParams::default()
        };
        let error = SensorIdCodec::from_parts(EncodingMode::TilePacked, &params, None, 512)
            .expect_err("init_sns_id is required");
        assert_eq!(
            error,
            CodecConfigError::MissingInitSensorId {
                mode: EncodingMode::TilePacked
            }
        );

        let codec = SensorIdCodec::from_parts(EncodingMode::DualPlane, &params, None, 128)
            .expect("dual plane has no floor requirement");
        assert_eq!(
            codec.plane_layout().map(PlaneLayout::max_sensors_per_plane),
            Some(256)
        );
    }
}
