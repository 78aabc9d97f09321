use crate::alphabet::alphabet::{Alphabet, AlphabetName};
use crate::make_error;
use crate::model::model::{ModelOptions, SubstitutionModel};
use crate::model::rate_matrix::RateMatrixInput;
use eyre::Report;
use ndarray::{array, Array1, Array2};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use strum_macros::{Display, EnumIter, EnumString};

/// Pre-defined substitution models, looked up by name case-insensitively
#[derive(
  Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, SmartDefault, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[allow(clippy::upper_case_acronyms)]
pub enum ModelName {
  #[default]
  JC69,
  K80,
  F81,
  HKY85,
  T92,
  Poisson,
  WAG,
}

impl ModelName {
  pub const fn alphabet(self) -> AlphabetName {
    match self {
      ModelName::JC69 | ModelName::K80 | ModelName::F81 | ModelName::HKY85 | ModelName::T92 => AlphabetName::Nuc,
      ModelName::Poisson | ModelName::WAG => AlphabetName::Aa,
    }
  }
}

/// Creates a pre-defined model with its default parameters
pub fn create_preset(name: ModelName, options: &ModelOptions) -> Result<SubstitutionModel, Report> {
  match name {
    ModelName::JC69 => jc69(options),
    ModelName::K80 => k80(K80Params::default(), options),
    ModelName::F81 => f81(F81Params::default(), options),
    ModelName::HKY85 => hky85(HKY85Params::default(), options),
    ModelName::T92 => t92(T92Params::default(), options),
    ModelName::Poisson => poisson(options),
    ModelName::WAG => wag(options),
  }
}

/// Jukes-Cantor 1969 model.
///
/// This model assumes equal concentrations of the nucleotides and equal transition rates
/// between nucleotide states.
///
/// See: Jukes and Cantor (1969). Evolution of Protein Molecules. New York: Academic Press. pp. 21–132
pub fn jc69(options: &ModelOptions) -> Result<SubstitutionModel, Report> {
  equal_input(ModelName::JC69, options)
}

#[derive(Copy, Clone, Debug, PartialEq, SmartDefault, Serialize, Deserialize)]
pub struct K80Params {
  /// Ratio of transition to transversion rates
  #[default = 0.1]
  pub kappa: f64,
}

/// Kimura 1980 model.
///
/// Assumes equal concentrations across nucleotides, but
/// allows different rates between transitions and transversions. The ratio
/// of the transition/transversion rates is given by kappa parameter.
///
/// See: Kimura (1980),  J. Mol. Evol. 16 (2): 111–120. doi:10.1007/BF01731581.
pub fn k80(K80Params { kappa }: K80Params, options: &ModelOptions) -> Result<SubstitutionModel, Report> {
  let pi = Array1::<f64>::from_elem(4, 0.25);
  nucleotide_model(ModelName::K80, pi, transition_transversion(kappa), options)
}

#[derive(Copy, Clone, Debug, PartialEq, SmartDefault, Serialize, Deserialize)]
pub struct F81Params {
  /// Equilibrium frequencies of A, C, G and T
  #[default([0.25, 0.25, 0.25, 0.25])]
  pub pi: [f64; 4],
}

/// Felsenstein 1981 model.
///
/// Assumes non-equal concentrations across nucleotides,
/// but the transition rate between all states is assumed to be equal.
///
/// See: Felsenstein (1981), J. Mol. Evol. 17  (6): 368–376. doi:10.1007/BF01734359
pub fn f81(F81Params { pi }: F81Params, options: &ModelOptions) -> Result<SubstitutionModel, Report> {
  let pi = normalized(&Array1::from(pi.to_vec()));
  nucleotide_model(ModelName::F81, pi, Array2::<f64>::ones((4, 4)), options)
}

#[derive(Copy, Clone, Debug, PartialEq, SmartDefault, Serialize, Deserialize)]
pub struct HKY85Params {
  /// Ratio of transition to transversion rates
  #[default = 0.1]
  pub kappa: f64,

  /// Equilibrium frequencies of A, C, G and T
  #[default([0.25, 0.25, 0.25, 0.25])]
  pub pi: [f64; 4],
}

/// Hasegawa, Kishino and Yano 1985 model.
///
/// Allows different concentrations of the nucleotides (as in F81) and distinguishes between transition/transversion
/// substitutions (similar to K80).
///
/// See: Hasegawa, Kishino, Yano (1985), J. Mol. Evol. 22 (2): 160–174. doi:10.1007/BF02101694
pub fn hky85(HKY85Params { kappa, pi }: HKY85Params, options: &ModelOptions) -> Result<SubstitutionModel, Report> {
  let pi = normalized(&Array1::from(pi.to_vec()));
  nucleotide_model(ModelName::HKY85, pi, transition_transversion(kappa), options)
}

#[allow(non_snake_case)]
#[derive(Copy, Clone, Debug, PartialEq, SmartDefault, Serialize, Deserialize)]
pub struct T92Params {
  /// Ratio of transition to transversion rates
  #[default = 0.1]
  pub kappa: f64,

  /// Relative GC content
  #[default = 0.5]
  pub pi_GC: f64,
}

/// Tamura 1992 model.
///
/// Extending Kimura (1980) model for the case where a G+C-content bias exists.
///
/// See: Tamura K (1992),  Mol.  Biol. Evol. 9 (4): 678–687.  DOI: 10.1093/oxfordjournals.molbev.a040752
#[allow(non_snake_case)]
pub fn t92(T92Params { kappa, pi_GC }: T92Params, options: &ModelOptions) -> Result<SubstitutionModel, Report> {
  if !(0.0..=1.0).contains(&pi_GC) {
    return make_error!("The relative GC should be between 0 and 1, but found pi_GC={pi_GC}");
  }
  let pi = array![(1.0 - pi_GC) * 0.5, pi_GC * 0.5, pi_GC * 0.5, (1.0 - pi_GC) * 0.5];
  nucleotide_model(ModelName::T92, pi, transition_transversion(kappa), options)
}

/// Poisson model of amino acid substitution: the protein analogue of Jukes-Cantor, with equal frequencies and
/// equal exchange rates between all 20 amino acids.
pub fn poisson(options: &ModelOptions) -> Result<SubstitutionModel, Report> {
  equal_input(ModelName::Poisson, options)
}

/// Order of amino acids in the published WAG tables
const WAG_ORDER: &str = "ARNDCQEGHILKMFPSTWYV";

/// Lower triangle of the WAG exchangeability matrix in `WAG_ORDER`. Row `k` holds the entries of amino acid `k + 1`
/// against amino acids `0..=k`.
#[rustfmt::skip]
const WAG_EXCHANGEABILITIES: [&[f64]; 19] = [
  &[0.551571],
  &[0.509848, 0.635346],
  &[0.738998, 0.147304, 5.429420],
  &[1.027040, 0.528191, 0.265256, 0.0302949],
  &[0.908598, 3.035500, 1.543640, 0.616783, 0.0988179],
  &[1.582850, 0.439157, 0.947198, 6.174160, 0.021352, 5.469470],
  &[1.416720, 0.584665, 1.125560, 0.865584, 0.306674, 0.330052, 0.567717],
  &[0.316954, 2.137150, 3.956290, 0.930676, 0.248972, 4.294110, 0.570025, 0.249410],
  &[0.193335, 0.186979, 0.554236, 0.039437, 0.170135, 0.113917, 0.127395, 0.0304501, 0.138190],
  &[0.397915, 0.497671, 0.131528, 0.0848047, 0.384287, 0.869489, 0.154263, 0.0613037, 0.499462, 3.170970],
  &[0.906265, 5.351420, 3.012010, 0.479855, 0.0740339, 3.894900, 2.584430, 0.373558, 0.890432, 0.323832, 0.257555],
  &[0.893496, 0.683162, 0.198221, 0.103754, 0.390482, 1.545260, 0.315124, 0.174100, 0.404141, 4.257460, 4.854020,
    0.934276],
  &[0.210494, 0.102711, 0.0961621, 0.0467304, 0.398020, 0.0999208, 0.0811339, 0.049931, 0.679371, 1.059470, 2.115170,
    0.088836, 1.190630],
  &[1.438550, 0.679489, 0.195081, 0.423984, 0.109404, 0.933372, 0.682355, 0.243570, 0.696198, 0.0999288, 0.415844,
    0.556896, 0.171329, 0.161444],
  &[3.370790, 1.224190, 3.974230, 1.071760, 1.407660, 1.028870, 0.704939, 1.341820, 0.740169, 0.319440, 0.344739,
    0.967130, 0.493905, 0.545931, 1.613280],
  &[2.121110, 0.554413, 2.030060, 0.374866, 0.512984, 0.857928, 0.822765, 0.225833, 0.473307, 1.458160, 0.326622,
    1.386980, 1.516120, 0.171903, 0.795384, 4.378020],
  &[0.113133, 1.163920, 0.0719167, 0.129767, 0.717070, 0.215737, 0.156557, 0.336983, 0.262569, 0.212483, 0.665309,
    0.137505, 0.515706, 1.529640, 0.139405, 0.523742, 0.110864],
  &[0.240735, 0.381533, 1.086000, 0.325711, 0.543833, 0.227710, 0.196303, 0.103604, 3.873440, 0.420170, 0.398618,
    0.133264, 0.428437, 6.454280, 0.216046, 0.786993, 0.291148, 2.485390],
  &[2.006010, 0.251849, 0.196246, 0.152335, 1.002140, 0.301281, 0.588731, 0.187247, 0.118358, 7.821300, 1.800340,
    0.305434, 2.058450, 0.649892, 0.314887, 0.232739, 1.388230, 0.365369, 0.314730],
];

/// Equilibrium amino acid frequencies of WAG in `WAG_ORDER`
#[rustfmt::skip]
const WAG_FREQUENCIES: [f64; 20] = [
  0.0866279, 0.043972, 0.0390894, 0.0570451, 0.0193078, 0.0367281, 0.0580589, 0.0832518, 0.0244313, 0.048466,
  0.086209, 0.0620286, 0.0195027, 0.0384319, 0.0457631, 0.0695179, 0.0610127, 0.0143859, 0.0352742, 0.0708956,
];

/// Whelan and Goldman 2001 empirical model of amino acid substitution.
///
/// Exchangeabilities and frequencies were estimated by maximum likelihood from a large database of globular protein
/// families.
///
/// See: Whelan and Goldman (2001), Mol. Biol. Evol. 18 (5): 691–699. doi:10.1093/oxfordjournals.molbev.a003851
pub fn wag(options: &ModelOptions) -> Result<SubstitutionModel, Report> {
  let alphabet = Alphabet::new(ModelName::WAG.alphabet());
  let order = WAG_ORDER
    .chars()
    .map(|c| alphabet.index(c))
    .collect::<Result<Vec<_>, _>>()?;

  let n = alphabet.len();
  let mut s = Array2::<f64>::zeros((n, n));
  for (k, row) in WAG_EXCHANGEABILITIES.iter().enumerate() {
    let i = order[k + 1];
    for (&j, &value) in order.iter().zip(row.iter()) {
      s[[i, j]] = value;
      s[[j, i]] = value;
    }
  }

  let mut pi = Array1::<f64>::zeros(n);
  for (&i, &f) in order.iter().zip(WAG_FREQUENCIES.iter()) {
    pi[i] = f;
  }

  SubstitutionModel::new(
    ModelName::WAG.to_string(),
    alphabet,
    normalized(&pi),
    &RateMatrixInput::Exchangeabilities(s),
    options,
  )
}

fn equal_input(name: ModelName, options: &ModelOptions) -> Result<SubstitutionModel, Report> {
  let alphabet = Alphabet::new(name.alphabet());
  let n = alphabet.len();
  let pi = Array1::<f64>::from_elem(n, 1.0 / n as f64);
  let s = Array2::<f64>::ones((n, n));
  SubstitutionModel::new(name.to_string(), alphabet, pi, &RateMatrixInput::Exchangeabilities(s), options)
}

fn nucleotide_model(
  name: ModelName,
  pi: Array1<f64>,
  s: Array2<f64>,
  options: &ModelOptions,
) -> Result<SubstitutionModel, Report> {
  let alphabet = Alphabet::new(AlphabetName::Nuc);
  SubstitutionModel::new(name.to_string(), alphabet, pi, &RateMatrixInput::Exchangeabilities(s), options)
}

fn normalized(pi: &Array1<f64>) -> Array1<f64> {
  let sum = pi.sum();
  if sum > 0.0 {
    pi / sum
  } else {
    pi.clone()
  }
}

/// Exchangeabilities with `kappa` on the transitions A<->G and C<->T and one on the transversions
fn transition_transversion(kappa: f64) -> Array2<f64> {
  let mut s = Array2::<f64>::ones((4, 4));
  s[[0, 2]] = kappa;
  s[[1, 3]] = kappa;
  s[[2, 0]] = kappa;
  s[[3, 1]] = kappa;
  s
}
