/// Vacuum permittivity in F/m.
pub const EPSILON_0: f64 = 8.85e-12;
/// Speed of light in vacuum in m/s.
pub const C_0: f64 = 3e8;

/// Energies at or below this are treated as no field at all.
const DEGENERATE_ENERGY: f64 = 1e-12;

/// Transmission line parameters per unit length, derived from a solved grid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ImpedanceResult {
    /// The reference voltage `v0` the energies are normalised by.
    pub voltage: f64,
    pub energy_homogenous: f64,
    pub energy_inhomogenous: f64,
    /// Characteristic impedance in ohms.
    pub z0: f64,
    /// Capacitance without dielectric.
    pub ch: f64,
    /// Capacitance with dielectric.
    pub cih: f64,
    /// Inductance, which the dielectric does not affect.
    pub lh: f64,
    pub propagation_speed: f64,
    pub propagation_delay: f64,
}

impl ImpedanceResult {
    /// Derives every parameter from the two field energies.
    ///
    /// The energies are `integral(|E|^2 dA)` with and without the relative
    /// permittivity weighting. In 2D this is independent of the length unit
    /// the grid was built in.
    pub fn from_energies(voltage: f64, energy_homogenous: f64, energy_inhomogenous: f64) -> Self {
        let v0_squared = voltage*voltage;
        let ch = EPSILON_0*energy_homogenous/v0_squared;
        let lh = 1.0/(C_0*C_0*ch);
        let cih = EPSILON_0*energy_inhomogenous/v0_squared;
        let z0 = (lh/cih).sqrt();
        let propagation_speed = 1.0/(cih*lh).sqrt();
        let propagation_delay = 1.0/propagation_speed;
        Self {
            voltage,
            energy_homogenous,
            energy_inhomogenous,
            z0,
            ch,
            cih,
            lh,
            propagation_speed,
            propagation_delay,
        }
    }

    /// Effective relative permittivity seen by the propagating wave.
    #[inline]
    pub fn effective_permittivity(&self) -> f64 {
        self.energy_inhomogenous/self.energy_homogenous
    }

    /// Whether the solve left (almost) no field energy, e.g. a shorted
    /// domain, so that the derived parameters are meaningless.
    pub fn is_degenerate(&self) -> bool {
        let energy_ok = |energy: f64| energy.is_finite() && energy > DEGENERATE_ENERGY;
        !(energy_ok(self.energy_homogenous) && energy_ok(self.energy_inhomogenous))
            || !(self.z0.is_finite() && self.z0 > 0.0)
    }
}
