//! Physical constants used by the column calculations.

/// Avogadro constant (molecules per mole).
pub const AVOGADRO: f64 = 6.022_140_76e23;

/// Molar gas constant (J mol^-1 K^-1).
pub const GAS_CONSTANT: f64 = 8.314_462_618;

/// Volume mixing ratio of one ppbv (mol/mol).
pub const PPBV_TO_MOL_PER_MOL: f64 = 1e-9;

/// Square metres to square centimetres divisor.
pub const M2_TO_CM2: f64 = 1e4;

/// Degrees of longitude per hour of local solar time.
pub const DEGREES_PER_HOUR: f64 = 15.0;
