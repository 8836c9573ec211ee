use super::params::ParamLoadError;
use super::potentials::WellWindow;
use crate::core::io::tokens::Tokens;
use crate::core::models::residue::RESIDUE_TYPE_COUNT;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Basin slots reserved for each of `[Rama]` and `[Rama_P]`.
pub const RAMA_BASIN_SLOTS: usize = 6;
/// Total number of basins addressable by `[SSWeight]`: the `[Rama]` slots, then `[Rama_P]`.
pub const SS_WEIGHT_BASINS: usize = 2 * RAMA_BASIN_SLOTS;

/// Chain-extension factors below this value switch a DSSP hydrogen bond off.
pub const DSSP_NU_DELTA: f64 = 1e-4;
const PAP_DELTA: f64 = 1e-12;
const DEFAULT_FM_SIGMA_EXP: f64 = 0.15;
/// Contact-restraint wells are cut where the Gaussian falls to 1e-4: `sqrt(8 ln 10) σ`.
pub const RESTRAINT_SPREAD: f64 = 4.29;

/// Linear coefficients that rebuild the virtual N, C′ and H sites.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualSiteCoefficients {
    pub an: f64,
    pub bn: f64,
    pub cn: f64,
    pub ap: f64,
    pub bp: f64,
    pub cp: f64,
    pub ah: f64,
    pub bh: f64,
    pub ch: f64,
}

impl Default for VirtualSiteCoefficients {
    fn default() -> Self {
        Self {
            an: 0.4831806,
            bn: 0.7032820,
            cn: -0.1864262,
            ap: 0.4436538,
            bp: 0.2352006,
            cp: 0.3211455,
            ah: 0.8409657,
            bh: 0.8929599,
            ch: -0.7338894,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainParams {
    /// Spring constants for N–Cβ, C′–Cβ and N–C′.
    pub k: [f64; 3],
    pub r_ncb0: f64,
    pub r_cpcb0: f64,
    pub r_ncp0: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiParams {
    pub k: f64,
    pub chi0: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeParams {
    pub k: f64,
    /// Target Cα(i)–Cα(i+1) distance.
    pub r_alpha_alpha: f64,
    /// Target Cα(i)–O(i) distance.
    pub r_alpha_oxygen: f64,
    /// Target O(i)–Cα(i+1) distance.
    pub r_oxygen_alpha: f64,
}

/// Shape of the excluded-volume repulsion inside the contact radius `r0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepulsionProfile {
    /// `k (r − r0)²`, from `[Excluded]`.
    Harmonic,
    /// `k |r − r0|^p / r0^(p−2)`, from `[Excluded_P]`.
    Power(i32),
    /// `k / r⁶`, from `[Excluded_R6]`.
    InverseSixth,
}

impl RepulsionProfile {
    /// The energy and `dE/dr` of a contact at `r < r0`.
    pub fn evaluate(self, r: f64, r0: f64, k: f64) -> (f64, f64) {
        match self {
            RepulsionProfile::Harmonic => {
                let dr = r - r0;
                (k * dr * dr, 2.0 * k * dr)
            }
            RepulsionProfile::Power(p) => {
                let sign = if p % 2 == 0 { 1.0 } else { -1.0 };
                let factor = sign / r0.powi(p - 2);
                let dr = r - r0;
                (
                    factor * k * dr.powi(p),
                    factor * f64::from(p) * k * dr.powi(p - 1),
                )
            }
            RepulsionProfile::InverseSixth => {
                let r6 = r.powi(6);
                (k / r6, -6.0 * k / (r6 * r))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExcludedParams {
    pub k_carbon: f64,
    pub r_carbon: f64,
    pub k_oxygen: f64,
    pub r_oxygen: f64,
    pub profile: RepulsionProfile,
}

/// One Gaussian basin of the Ramachandran mixture. `phiw` and `psiw` already carry the
/// basin's `sigma` factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RamaBasin {
    pub w: f64,
    pub sigma: f64,
    pub phiw: f64,
    pub phi0: f64,
    pub psiw: f64,
    pub psi0: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RamaParams {
    pub k: f64,
    pub basins: Vec<RamaBasin>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DsspParams {
    pub k: f64,
    /// λ coefficients per separation class; only the first 2, 7, 9 and 9 entries are used.
    pub hbscl: [[f64; 9]; 4],
    pub sigma_ho: f64,
    pub sigma_no: f64,
    pub ho_zero: f64,
    pub no_zero: f64,
    pub cut: f64,
    pub pref: [f64; 2],
    pub d_nu0: f64,
}

impl DsspParams {
    /// Squared distance beyond which ν for the given prefactor is negligible.
    pub fn nu_cut_sq(&self, which: usize) -> f64 {
        (self.d_nu0 + (2.0 * DSSP_NU_DELTA - 1.0).atanh() / self.pref[which]).powi(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PApParams {
    pub k_global: f64,
    pub k_betapred: f64,
    pub k: [f64; 3],
    pub cut: f64,
    pub pref: f64,
    pub i_med_min: usize,
    pub i_med_max: usize,
    pub i_diff: usize,
}

impl PApParams {
    pub fn cutoff_sq(&self) -> f64 {
        (self.cut + (1.0 - 2.0 * PAP_DELTA).atanh() / self.pref).powi(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterWell {
    pub rmin: f64,
    pub rmax: f64,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaterParams {
    pub k: f64,
    pub kappa: f64,
    pub kappa_sigma: f64,
    pub threshold: f64,
    pub contact_cutoff: usize,
    pub wells: Vec<WaterWell>,
}

impl WaterParams {
    pub fn window(&self, well: usize) -> WellWindow {
        let w = &self.wells[well];
        WellWindow::new(w.rmin, w.rmax, self.kappa)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurialParams {
    pub k: f64,
    pub kappa: f64,
    /// Density bounds `(ρmin, ρmax)` of the three burial wells.
    pub ro: [(f64, f64); 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct HelixParams {
    pub k: f64,
    pub gamma_p: f64,
    pub gamma_w: f64,
    pub kappa: f64,
    pub kappa_sigma: f64,
    pub threshold: f64,
    pub i_diff: usize,
    pub cutoff: f64,
    pub rmin: f64,
    pub rmax: f64,
    pub h4prob: [f64; RESIDUE_TYPE_COUNT],
    pub pro_acceptor_flag: bool,
    pub h4prob_pro_acceptor: f64,
    pub sigma_ho: f64,
    pub sigma_no: f64,
    pub ho_zero: f64,
    pub no_zero: f64,
}

impl HelixParams {
    pub fn window(&self) -> WellWindow {
        WellWindow::new(self.rmin, self.rmax, self.kappa)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableGrid {
    pub rmin: f64,
    pub rmax: f64,
    pub dr: f64,
    pub well_width: f64,
    pub use_table_file: bool,
}

impl TableGrid {
    /// Number of nodes per curve.
    pub fn size(&self) -> usize {
        ((self.rmax - self.rmin) / self.dr) as usize + 2
    }

    #[inline]
    pub fn node(&self, k: usize) -> f64 {
        self.rmin + k as f64 * self.dr
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FragmentBackend {
    Direct,
    Table(TableGrid),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentMemoryParams {
    pub k: f64,
    pub memory_file: PathBuf,
    pub gamma_file: PathBuf,
    pub sigma_exp: f64,
    pub backend: FragmentBackend,
}

/// How the AMH-Go reference distances are filtered or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoCensoring {
    /// Every native contact of the reference structure counts.
    Off,
    /// Residue pairs listed in `frustration_censored_contacts.dat` are dropped.
    CensoredContacts,
    /// Native distances come from the `go_rnative*.dat` matrices instead of the structure.
    NativeDistances,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmhGoParams {
    pub k: f64,
    /// Exponent applied to each atom's summed contact energy.
    pub p: f64,
    /// Native distance below which a pair of atoms is a contact.
    pub rc: f64,
    pub censoring: GoCensoring,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactRestraintParams {
    pub k: f64,
    pub sigma: f64,
    pub file: PathBuf,
}

impl ContactRestraintParams {
    /// Distance from a restraint's `r0` past which its well is dropped.
    pub fn dr_cutoff(&self) -> f64 {
        RESTRAINT_SPREAD * self.sigma
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorFragmentParams {
    pub k: f64,
    /// Width of the Gaussian on the angle between Cα→Cβ vectors, in radians.
    pub sigma: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolventBarrierParams {
    pub k1: f64,
    pub rmin1: f64,
    pub rmax1: f64,
    pub k2: f64,
    pub rmin2: f64,
    pub rmax2: f64,
    pub kappa: f64,
    /// Smallest sequence separation of an intra-chain pair.
    pub min_sep: usize,
    /// Whether the wells are shifted by the per-type radii in `rshift`.
    pub radius_correction: bool,
    pub rshift: [f64; RESIDUE_TYPE_COUNT],
}

impl SolventBarrierParams {
    /// Distance past which both barriers are negligible: `rmax + 10/κ` for the widest
    /// possible shift.
    pub fn reach(&self) -> f64 {
        let shift = if self.radius_correction {
            2.0 * self.rshift.iter().copied().fold(0.0, f64::max)
        } else {
            0.0
        };
        self.rmax1.max(self.rmax2) + shift + 10.0 / self.kappa
    }
}

/// Everything read from the coefficient file. A `None` section means the term is off.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientSet {
    pub virtual_sites: VirtualSiteCoefficients,
    pub epsilon: f64,
    pub chain: Option<ChainParams>,
    pub shake: Option<ShakeParams>,
    pub chi: Option<ChiParams>,
    pub excluded: Option<ExcludedParams>,
    pub rama: Option<RamaParams>,
    pub rama_proline: Option<Vec<RamaBasin>>,
    pub ss_weight: Option<[bool; SS_WEIGHT_BASINS]>,
    pub dssp: Option<DsspParams>,
    pub p_ap: Option<PApParams>,
    pub water: Option<WaterParams>,
    pub burial: Option<BurialParams>,
    pub helix: Option<HelixParams>,
    pub amh_go: Option<AmhGoParams>,
    pub fragment_memory: Option<FragmentMemoryParams>,
    pub vector_fragment_memory: Option<VectorFragmentParams>,
    pub contact_restraints: Option<ContactRestraintParams>,
    pub solvent_barrier: Option<SolventBarrierParams>,
}

impl Default for CoefficientSet {
    fn default() -> Self {
        Self {
            virtual_sites: VirtualSiteCoefficients::default(),
            epsilon: 1.0,
            chain: None,
            shake: None,
            chi: None,
            excluded: None,
            rama: None,
            rama_proline: None,
            ss_weight: None,
            dssp: None,
            p_ap: None,
            water: None,
            burial: None,
            helix: None,
            amh_go: None,
            fragment_memory: None,
            vector_fragment_memory: None,
            contact_restraints: None,
            solvent_barrier: None,
        }
    }
}

struct Section<'a> {
    tokens: &'a mut Tokens,
    name: &'static str,
}

impl Section<'_> {
    fn field(&self, field: &str) -> String {
        format!("{} {}", self.name, field)
    }

    fn f64(&mut self, field: &str) -> Result<f64, ParamLoadError> {
        let what = self.field(field);
        Ok(self.tokens.next_f64(&what)?)
    }

    fn usize(&mut self, field: &str) -> Result<usize, ParamLoadError> {
        let what = self.field(field);
        Ok(self.tokens.next_usize(&what)?)
    }

    fn flag(&mut self, field: &str) -> Result<bool, ParamLoadError> {
        let what = self.field(field);
        Ok(self.tokens.next_flag(&what)?)
    }

    fn f64_array<const N: usize>(&mut self, field: &str) -> Result<[f64; N], ParamLoadError> {
        let what = self.field(field);
        Ok(self.tokens.next_f64_array::<N>(&what)?)
    }

    fn path(&mut self, field: &str) -> Result<PathBuf, ParamLoadError> {
        let what = self.field(field);
        Ok(PathBuf::from(self.tokens.next_str(&what)?))
    }

    fn excluded(&mut self, profile: RepulsionProfile) -> Result<ExcludedParams, ParamLoadError> {
        Ok(ExcludedParams {
            k_carbon: self.f64("k_excluded_C")?,
            r_carbon: self.f64("rC_ex0")?,
            k_oxygen: self.f64("k_excluded_O")?,
            r_oxygen: self.f64("rO_ex0")?,
            profile,
        })
    }

    fn invalid(&self, field: &str, message: impl Into<String>) -> ParamLoadError {
        ParamLoadError::Invalid {
            origin: self.tokens.origin().to_string(),
            what: self.field(field),
            message: message.into(),
        }
    }

    fn rama_basins(&mut self, count: usize) -> Result<Vec<RamaBasin>, ParamLoadError> {
        if count > RAMA_BASIN_SLOTS {
            return Err(self.invalid(
                "n",
                format!("at most {RAMA_BASIN_SLOTS} basins are supported, got {count}"),
            ));
        }
        (0..count)
            .map(|j| {
                let w = self.f64(&format!("w[{j}]"))?;
                let sigma = self.f64(&format!("sigma[{j}]"))?;
                let phiw = self.f64(&format!("phiw[{j}]"))?;
                let phi0 = self.f64(&format!("phi0[{j}]"))?;
                let psiw = self.f64(&format!("psiw[{j}]"))?;
                let psi0 = self.f64(&format!("psi0[{j}]"))?;
                Ok(RamaBasin {
                    w,
                    sigma,
                    phiw: phiw * sigma,
                    phi0,
                    psiw: psiw * sigma,
                    psi0,
                })
            })
            .collect()
    }
}

impl CoefficientSet {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let mut tokens = Tokens::read_from_path(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&mut tokens)
    }

    /// Reads every recognized section from the token stream, then applies the global
    /// energy scale. Unrecognized tokens are skipped, which is how a section is disabled.
    pub fn parse(tokens: &mut Tokens) -> Result<Self, ParamLoadError> {
        let mut set = Self::default();

        while let Some(header) = tokens.advance().map(str::to_string) {
            match header.as_str() {
                "[ABC]" => {
                    let mut s = Section { tokens, name: "[ABC]" };
                    let [an, bn, cn] = s.f64_array::<3>("n")?;
                    let [ap, bp, cp] = s.f64_array::<3>("p")?;
                    let [ah, bh, ch] = s.f64_array::<3>("h")?;
                    set.virtual_sites = VirtualSiteCoefficients {
                        an,
                        bn,
                        cn,
                        ap,
                        bp,
                        cp,
                        ah,
                        bh,
                        ch,
                    };
                }
                "[Chain]" => {
                    let mut s = Section { tokens, name: "[Chain]" };
                    set.chain = Some(ChainParams {
                        k: s.f64_array::<3>("k_chain")?,
                        r_ncb0: s.f64("r_ncb0")?,
                        r_cpcb0: s.f64("r_cpcb0")?,
                        r_ncp0: s.f64("r_ncp0")?,
                    });
                }
                "[Chi]" => {
                    let mut s = Section { tokens, name: "[Chi]" };
                    set.chi = Some(ChiParams {
                        k: s.f64("k_chi")?,
                        chi0: s.f64("chi0")?,
                    });
                }
                "[Shake]" => {
                    let mut s = Section { tokens, name: "[Shake]" };
                    set.shake = Some(ShakeParams {
                        k: s.f64("k_shake")?,
                        r_alpha_alpha: s.f64("r_sh1")?,
                        r_alpha_oxygen: s.f64("r_sh2")?,
                        r_oxygen_alpha: s.f64("r_sh3")?,
                    });
                }
                "[Excluded]" => {
                    let mut s = Section { tokens, name: "[Excluded]" };
                    let params = s.excluded(RepulsionProfile::Harmonic)?;
                    set.replace_excluded("[Excluded]", params);
                }
                "[Excluded_P]" => {
                    let mut s = Section { tokens, name: "[Excluded_P]" };
                    let p = s.usize("p")?;
                    if p == 0 || p > 64 {
                        return Err(s.invalid("p", format!("exponent must lie in 1..=64, got {p}")));
                    }
                    let params = s.excluded(RepulsionProfile::Power(p as i32))?;
                    set.replace_excluded("[Excluded_P]", params);
                }
                "[Excluded_R6]" => {
                    let mut s = Section { tokens, name: "[Excluded_R6]" };
                    let params = s.excluded(RepulsionProfile::InverseSixth)?;
                    set.replace_excluded("[Excluded_R6]", params);
                }
                "[Rama]" => {
                    let mut s = Section { tokens, name: "[Rama]" };
                    let k = s.f64("k_rama")?;
                    let n = s.usize("n")?;
                    let basins = s.rama_basins(n)?;
                    set.rama = Some(RamaParams { k, basins });
                }
                "[Rama_P]" => {
                    let mut s = Section { tokens, name: "[Rama_P]" };
                    let n = s.usize("n")?;
                    set.rama_proline = Some(s.rama_basins(n)?);
                }
                "[SSWeight]" => {
                    let mut s = Section { tokens, name: "[SSWeight]" };
                    let mut flags = [false; SS_WEIGHT_BASINS];
                    for (j, flag) in flags.iter_mut().enumerate() {
                        *flag = s.flag(&format!("flag[{j}]"))?;
                    }
                    set.ss_weight = Some(flags);
                }
                "[Dssp_Hdrgn]" => {
                    let mut s = Section { tokens, name: "[Dssp_Hdrgn]" };
                    let k = s.f64("k_dssp")?;
                    let mut hbscl = [[0.0; 9]; 4];
                    for (class, count) in [2usize, 7, 9, 9].into_iter().enumerate() {
                        for j in 0..count {
                            hbscl[class][j] = s.f64(&format!("hbscl[{class}][{j}]"))?;
                        }
                    }
                    set.dssp = Some(DsspParams {
                        k,
                        hbscl,
                        sigma_ho: s.f64("sigma_HO")?,
                        sigma_no: s.f64("sigma_NO")?,
                        ho_zero: s.f64("HO_zero")?,
                        no_zero: s.f64("NO_zero")?,
                        cut: s.f64("dssp_hdrgn_cut")?,
                        pref: s.f64_array::<2>("pref")?,
                        d_nu0: s.f64("d_nu0")?,
                    });
                }
                "[P_AP]" => {
                    let mut s = Section { tokens, name: "[P_AP]" };
                    set.p_ap = Some(PApParams {
                        k_global: s.f64("k_global_P_AP")?,
                        k_betapred: s.f64("k_betapred_P_AP")?,
                        k: s.f64_array::<3>("k_P_AP")?,
                        cut: s.f64("P_AP_cut")?,
                        pref: s.f64("P_AP_pref")?,
                        i_med_min: s.usize("i_med_min")?,
                        i_med_max: s.usize("i_med_max")?,
                        i_diff: s.usize("i_diff_P_AP")?,
                    });
                }
                "[Water]" => {
                    let mut s = Section { tokens, name: "[Water]" };
                    let k = s.f64("k_water")?;
                    let kappa = s.f64("water_kappa")?;
                    let kappa_sigma = s.f64("water_kappa_sigma")?;
                    let threshold = s.f64("treshold")?;
                    let contact_cutoff = s.usize("contact_cutoff")?;
                    let n_wells = s.usize("n_wells")?;
                    if n_wells == 0 {
                        return Err(s.invalid("n_wells", "at least one well is required"));
                    }
                    let wells = (0..n_wells)
                        .map(|j| {
                            Ok(WaterWell {
                                rmin: s.f64(&format!("well_r_min[{j}]"))?,
                                rmax: s.f64(&format!("well_r_max[{j}]"))?,
                                enabled: s.flag(&format!("well_flag[{j}]"))?,
                            })
                        })
                        .collect::<Result<Vec<_>, ParamLoadError>>()?;
                    set.water = Some(WaterParams {
                        k,
                        kappa,
                        kappa_sigma,
                        threshold,
                        contact_cutoff,
                        wells,
                    });
                }
                "[Burial]" => {
                    let mut s = Section { tokens, name: "[Burial]" };
                    let k = s.f64("k_burial")?;
                    let kappa = s.f64("burial_kappa")?;
                    let mut ro = [(0.0, 0.0); 3];
                    for (l, bounds) in ro.iter_mut().enumerate() {
                        *bounds = (
                            s.f64(&format!("burial_ro_min[{l}]"))?,
                            s.f64(&format!("burial_ro_max[{l}]"))?,
                        );
                    }
                    set.burial = Some(BurialParams { k, kappa, ro });
                }
                "[Helix]" => {
                    let mut s = Section { tokens, name: "[Helix]" };
                    let k = s.f64("k_helix")?;
                    let gamma_p = s.f64("helix_gamma_p")?;
                    let gamma_w = s.f64("helix_gamma_w")?;
                    let kappa = s.f64("helix_kappa")?;
                    let kappa_sigma = s.f64("helix_kappa_sigma")?;
                    let threshold = s.f64("helix_treshold")?;
                    let i_diff = s.usize("helix_i_diff")?;
                    if i_diff == 0 {
                        return Err(s.invalid("helix_i_diff", "must be positive"));
                    }
                    let cutoff = s.f64("helix_cutoff")?;
                    let rmin = s.f64("helix_well_r_min")?;
                    let rmax = s.f64("helix_well_r_max")?;
                    let h4prob = s.f64_array::<RESIDUE_TYPE_COUNT>("h4prob")?;
                    set.helix = Some(HelixParams {
                        k,
                        gamma_p,
                        gamma_w,
                        kappa,
                        kappa_sigma,
                        threshold,
                        i_diff,
                        cutoff,
                        rmin,
                        rmax,
                        h4prob,
                        pro_acceptor_flag: s.flag("pro_accepter_flag")?,
                        h4prob_pro_acceptor: s.f64("h4prob_pro_accepter")?,
                        sigma_ho: s.f64("helix_sigma_HO")?,
                        sigma_no: s.f64("helix_sigma_NO")?,
                        ho_zero: s.f64("helix_HO_zero")?,
                        no_zero: s.f64("helix_NO_zero")?,
                    });
                }
                "[AMH-Go]" => {
                    let mut s = Section { tokens, name: "[AMH-Go]" };
                    let k = s.f64("k_amh_go")?;
                    let p = s.f64("amh_go_p")?;
                    if p < 1.0 {
                        return Err(s.invalid("amh_go_p", format!("must be at least 1, got {p}")));
                    }
                    let rc = s.f64("amh_go_rc")?;
                    let censoring = match s.usize("frustration_censoring_flag")? {
                        0 => GoCensoring::Off,
                        1 => GoCensoring::CensoredContacts,
                        2 => GoCensoring::NativeDistances,
                        other => {
                            return Err(s.invalid(
                                "frustration_censoring_flag",
                                format!("expected 0, 1 or 2, got {other}"),
                            ));
                        }
                    };
                    set.amh_go = Some(AmhGoParams { k, p, rc, censoring });
                }
                "[Fragment_Memory]" => {
                    if set.fragment_memory.is_some() {
                        return Err(both_fragment_sections());
                    }
                    let mut s = Section { tokens, name: "[Fragment_Memory]" };
                    set.fragment_memory = Some(FragmentMemoryParams {
                        k: s.f64("k_frag_mem")?,
                        memory_file: s.path("frag_mems_file")?,
                        gamma_file: s.path("fm_gamma_file")?,
                        sigma_exp: DEFAULT_FM_SIGMA_EXP,
                        backend: FragmentBackend::Direct,
                    });
                }
                "[Fragment_Memory_Table]" => {
                    if set.fragment_memory.is_some() {
                        return Err(both_fragment_sections());
                    }
                    let mut s = Section {
                        tokens,
                        name: "[Fragment_Memory_Table]",
                    };
                    let k = s.f64("k_frag_mem")?;
                    let memory_file = s.path("frag_mems_file")?;
                    let gamma_file = s.path("fm_gamma_file")?;
                    let rmin = s.f64("tb_rmin")?;
                    let rmax = s.f64("tb_rmax")?;
                    let dr = s.f64("tb_dr")?;
                    if dr <= 0.0 || rmax <= rmin || rmin <= 0.0 {
                        return Err(s.invalid(
                            "tb_rmin/tb_rmax/tb_dr",
                            format!("invalid grid {rmin}..{rmax} step {dr}"),
                        ));
                    }
                    let well_width = s.f64("frag_table_well_width")?;
                    let use_table_file = s.flag("fm_use_table_flag")?;
                    let sigma_exp = match s.tokens.peek().map(str::parse::<f64>) {
                        Some(Ok(_)) => s.f64("fm_sigma_exp")?,
                        _ => DEFAULT_FM_SIGMA_EXP,
                    };
                    set.fragment_memory = Some(FragmentMemoryParams {
                        k,
                        memory_file,
                        gamma_file,
                        sigma_exp,
                        backend: FragmentBackend::Table(TableGrid {
                            rmin,
                            rmax,
                            dr,
                            well_width,
                            use_table_file,
                        }),
                    });
                }
                "[Contact_Restraints]" => {
                    let mut s = Section {
                        tokens,
                        name: "[Contact_Restraints]",
                    };
                    let k = s.f64("k_cont_rest")?;
                    let sigma = s.f64("cr_sigma")?;
                    if sigma <= 0.0 {
                        return Err(s.invalid("cr_sigma", "must be positive"));
                    }
                    set.contact_restraints = Some(ContactRestraintParams {
                        k,
                        sigma,
                        file: s.path("cr_file")?,
                    });
                }
                "[Vector_Fragment_Memory]" => {
                    let mut s = Section {
                        tokens,
                        name: "[Vector_Fragment_Memory]",
                    };
                    let k = s.f64("k_vec_frag_mem")?;
                    let sigma = s.f64("vfm_sigma")?;
                    if sigma <= 0.0 {
                        return Err(s.invalid("vfm_sigma", "must be positive"));
                    }
                    set.vector_fragment_memory = Some(VectorFragmentParams { k, sigma });
                }
                "[Solvent_Barrier]" => {
                    let mut s = Section {
                        tokens,
                        name: "[Solvent_Barrier]",
                    };
                    let k1 = s.f64("k_solventb1")?;
                    let rmin1 = s.f64("ssb_rmin1")?;
                    let rmax1 = s.f64("ssb_rmax1")?;
                    let k2 = s.f64("k_solventb2")?;
                    let rmin2 = s.f64("ssb_rmin2")?;
                    let rmax2 = s.f64("ssb_rmax2")?;
                    let kappa = s.f64("ssb_kappa")?;
                    if kappa <= 0.0 {
                        return Err(s.invalid("ssb_kappa", "must be positive"));
                    }
                    set.solvent_barrier = Some(SolventBarrierParams {
                        k1,
                        rmin1,
                        rmax1,
                        k2,
                        rmin2,
                        rmax2,
                        kappa,
                        min_sep: s.usize("ssb_ij_sep")?,
                        radius_correction: s.flag("ssb_rad_cor")?,
                        rshift: s.f64_array::<RESIDUE_TYPE_COUNT>("ssb_rshift")?,
                    });
                }
                "[Epsilon]" => {
                    let mut s = Section { tokens, name: "[Epsilon]" };
                    set.epsilon = s.f64("epsilon")?;
                }
                _ => {}
            }
        }

        if set.burial.is_some() && set.water.is_none() {
            return Err(ParamLoadError::Inconsistent(
                "[Burial] requires the [Water] section".into(),
            ));
        }
        if set.vector_fragment_memory.is_some() && set.fragment_memory.is_none() {
            return Err(ParamLoadError::Inconsistent(
                "[Vector_Fragment_Memory] requires [Fragment_Memory] or [Fragment_Memory_Table]"
                    .into(),
            ));
        }

        set.apply_epsilon();
        set.log_active_sections();
        Ok(set)
    }

    /// The excluded-volume sections share one slot; a later one replaces an earlier one.
    fn replace_excluded(&mut self, section: &'static str, params: ExcludedParams) {
        if let Some(previous) = self.excluded.replace(params) {
            warn!(
                section,
                replaced = ?previous.profile,
                "More than one excluded-volume section; the last one is used"
            );
        }
    }

    fn apply_epsilon(&mut self) {
        let eps = self.epsilon;
        if let Some(chain) = self.chain.as_mut() {
            chain.k.iter_mut().for_each(|k| *k *= eps);
        }
        if let Some(shake) = self.shake.as_mut() {
            shake.k *= eps;
        }
        if let Some(chi) = self.chi.as_mut() {
            chi.k *= eps;
        }
        if let Some(excluded) = self.excluded.as_mut() {
            excluded.k_carbon *= eps;
            excluded.k_oxygen *= eps;
        }
        if let Some(rama) = self.rama.as_mut() {
            rama.k *= eps;
            let k = rama.k;
            rama.basins.iter_mut().for_each(|b| b.w *= k);
            if let Some(proline) = self.rama_proline.as_mut() {
                proline.iter_mut().for_each(|b| b.w *= k);
            }
        }
        if let Some(dssp) = self.dssp.as_mut() {
            dssp.k *= eps;
        }
        if let Some(p_ap) = self.p_ap.as_mut() {
            p_ap.k_global *= eps;
        }
        if let Some(water) = self.water.as_mut() {
            water.k *= eps;
        }
        if let Some(burial) = self.burial.as_mut() {
            burial.k *= eps;
        }
        if let Some(helix) = self.helix.as_mut() {
            helix.k *= eps;
        }
        if let Some(go) = self.amh_go.as_mut() {
            go.k *= eps;
        }
        if let Some(fm) = self.fragment_memory.as_mut() {
            fm.k *= eps;
        }
        if let Some(vfm) = self.vector_fragment_memory.as_mut() {
            vfm.k *= eps;
        }
        if let Some(restraints) = self.contact_restraints.as_mut() {
            restraints.k *= eps;
        }
        if let Some(ssb) = self.solvent_barrier.as_mut() {
            ssb.k1 *= eps;
            ssb.k2 *= eps;
        }
    }

    fn log_active_sections(&self) {
        let active = [
            ("Chain", self.chain.is_some()),
            ("Shake", self.shake.is_some()),
            ("Chi", self.chi.is_some()),
            ("Excluded", self.excluded.is_some()),
            ("Rama", self.rama.is_some()),
            ("Rama_P", self.rama_proline.is_some()),
            ("SSWeight", self.ss_weight.is_some()),
            ("Dssp_Hdrgn", self.dssp.is_some()),
            ("P_AP", self.p_ap.is_some()),
            ("Water", self.water.is_some()),
            ("Burial", self.burial.is_some()),
            ("Helix", self.helix.is_some()),
            ("AMH-Go", self.amh_go.is_some()),
            ("Fragment_Memory", self.fragment_memory.is_some()),
            ("Vector_Fragment_Memory", self.vector_fragment_memory.is_some()),
            ("Contact_Restraints", self.contact_restraints.is_some()),
            ("Solvent_Barrier", self.solvent_barrier.is_some()),
        ];
        for (name, on) in active {
            if on {
                info!(section = name, "Coefficient section active");
            }
        }
    }

    /// The residue-pair search radius needed by every active pair term.
    pub fn pair_cutoff(&self) -> f64 {
        let mut cutoff: f64 = 8.0;
        if let Some(dssp) = &self.dssp {
            cutoff = cutoff.max(dssp.cut);
        }
        if let Some(p_ap) = &self.p_ap {
            cutoff = cutoff.max(p_ap.cutoff_sq().sqrt());
        }
        if let Some(water) = &self.water {
            for well in 0..water.wells.len() {
                cutoff = cutoff.max(water.window(well).rmax_theta);
            }
        }
        if let Some(helix) = &self.helix {
            cutoff = cutoff
                .max(helix.window().rmax_theta)
                .max(helix.cutoff)
                .max(self.helix_contact_reach(helix));
        }
        if let Some(ssb) = &self.solvent_barrier {
            cutoff = cutoff.max(ssb.reach());
        }
        cutoff
    }

    /// Distance from O(i) at which the helix hydrogen-bond Gaussians fall below 1e-3,
    /// widened by the largest separation between a virtual N or H site and the atoms it
    /// is built from.
    fn helix_contact_reach(&self, helix: &HelixParams) -> f64 {
        let c = &self.virtual_sites;
        let r0 = [3.77, 2.5, 2.41];
        let reach = |a: f64, b: f64, cc: f64| {
            let span = |x: f64, y: f64, p: f64, q: f64, opp: f64| {
                ((x * p).powi(2) + (y * q).powi(2) + x * y * (p * p + q * q - opp * opp)).sqrt()
            };
            span(a, cc, r0[0], r0[1], r0[2])
                .max(span(a, b, r0[2], r0[1], r0[0]))
                .max(span(b, cc, r0[0], r0[2], r0[1]))
        };
        let spread = (6.0 * 10f64.ln()).sqrt();
        let reach_no = 1.1 * reach(c.an, c.bn, c.cn) + helix.no_zero + helix.sigma_no * spread;
        let reach_ho = 1.1 * reach(c.ah, c.bh, c.ch) + helix.ho_zero + helix.sigma_ho * spread;
        reach_no.max(reach_ho)
    }
}

fn both_fragment_sections() -> ParamLoadError {
    ParamLoadError::Inconsistent(
        "[Fragment_Memory] and [Fragment_Memory_Table] cannot both be active".into(),
    )
}
