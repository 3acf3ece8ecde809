//! Clinical form records and the request fields that build them
//!
//! Every form is stored as a [`FormRecord`]: an id, the patient it belongs
//! to, timestamps and a [`FormBody`] holding the kind-specific content.
//! Request bodies deserialize into one of the `*Fields` structs, which are
//! shared by creation (every field required) and partial updates (only the
//! present fields are applied).

use crate::core::error::ApiError;
use crate::core::validation::nullable::{patch, present, required};
use crate::core::validation::{is_digits, parse_iso_date};
use bitflags::{Flags, bitflags};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Declares an enumeration that travels as a fixed string on the wire
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($what:literal) {
            $($variant:ident => $wire:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
        #[serde(try_from = "String")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                $name::parse(&value).ok_or_else(|| format!("invalid {}", $what))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// Every kind of form the service stores
    FormKind ("form type") {
        PatientInformation => "patient_information",
        SociodemographicEvaluation => "sociodemographic_evaluation",
        KineticFunctionalEvaluation => "kinetic_functional_evaluation",
        Goniometry => "goniometry",
        AshworthScale => "ashworth_scale",
        SensoryEvaluation => "sensory_evaluation",
        RespiratoryMuscleStrength => "respiratory_muscle_strength",
        PainEvaluation => "pain_evaluation",
        MuscleStrength => "muscle_strength",
    }
}

wire_enum! {
    /// Structure-and-function form kinds, addressed by `form_t` in the path
    StructureAndFunctionKind ("form_t value") {
        Goniometry => "goniometry",
        AshworthScale => "ashworth_scale",
        SensoryEvaluation => "sensory_evaluation",
        RespiratoryMuscleStrength => "respiratory_muscle_strength",
        PainEvaluation => "pain_evaluation",
        MuscleStrength => "muscle_strength",
    }
}

impl StructureAndFunctionKind {
    /// Parse the `form_t` path segment
    pub fn from_path(form_t: &str) -> Result<Self, ApiError> {
        Self::parse(form_t).ok_or_else(|| ApiError::invalid("unknown form_t value"))
    }

    pub fn form_kind(self) -> FormKind {
        match self {
            Self::Goniometry => FormKind::Goniometry,
            Self::AshworthScale => FormKind::AshworthScale,
            Self::SensoryEvaluation => FormKind::SensoryEvaluation,
            Self::RespiratoryMuscleStrength => FormKind::RespiratoryMuscleStrength,
            Self::PainEvaluation => FormKind::PainEvaluation,
            Self::MuscleStrength => FormKind::MuscleStrength,
        }
    }
}

impl FormKind {
    /// Path segment of the kind's resources, e.g. `patientinformation`
    pub fn segment(self) -> String {
        self.as_str().replace('_', "")
    }
}

wire_enum! {
    Gender ("gender") {
        Masculine => "Masculino",
        Feminine => "Feminino",
    }
}

wire_enum! {
    CivilStatus ("civil_status") {
        Single => "Solteiro(a)",
        Married => "Casado(a)",
        Divorced => "Divorciado(a)",
        Widowed => "Viúvo(a)",
    }
}

wire_enum! {
    LivesWith ("lives_with_status") {
        Alone => "Sozinho(a)",
        Relatives => "Familiares",
        Friends => "Amigos",
        Spouse => "Cônjuge",
    }
}

wire_enum! {
    Education ("education") {
        Illiterate => "Analfabeto(a)",
        Primary => "Primeiro Grau",
        Secondary => "Segundo Grau",
        Tertiary => "Superior/Pós-graduado(a)",
    }
}

wire_enum! {
    OccupationalStatus ("occupational_status") {
        Student => "Estudante",
        Unemployed => "Desempregado(a)",
        Employed => "Empregado(a)",
        AwayForHealth => "Afastado(a) por problemas de saúde",
        Retired => "Aposentado(a)",
    }
}

wire_enum! {
    /// Side or quantity a measure refers to
    MeasureType ("measure type value") {
        LeftSide => "E",
        RightSide => "D",
        MaximumInspirationPressure => "PiMax",
        MaximumExpirationPressure => "PeMax",
        PainIntensity => "Intensidade da Dor",
    }
}

wire_enum! {
    SensoryType ("measure sensory type value") {
        LightTouch => "Toque Leve",
        Pressure => "Pressão",
        Stings => "Picadas",
        Temperature => "Temperatura",
        TactileLocation => "Localização Tática",
        SimultaneousBilateralTouch => "Toque Bilateral Simultâneo",
        Proprioception => "Propriocepção",
    }
}

// =============================================================================
// Planned tests of the kinetic functional evaluation
// =============================================================================

bitflags! {
    /// Structure and function tests planned for a patient
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StructureAndFunctionTests: u16 {
        const GONIOMETRY = 1;
        const ASHWORTH_SCALE = 1 << 1;
        const SENSORY_EVALUATION = 1 << 2;
        const RESPIRATORY_MUSCLE_STRENGTH = 1 << 3;
        const SPIROMETRY = 1 << 4;
        const PEAK_FLOW = 1 << 5;
        const VENTILOMETRY = 1 << 6;
        const PAIN_EVALUATION = 1 << 7;
        const MUSCLE_STRENGTH = 1 << 8;
        const BAROPODOMETRY = 1 << 9;
        const ELECTROMYOGRAPHY = 1 << 10;
        const BIOPHOTOGRAMMETRY = 1 << 11;
        const DYNAMOMETRY = 1 << 12;
    }
}

bitflags! {
    /// Activity and participation tests planned for a patient
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ActivityAndParticipationTests: u32 {
        const MARCH_EVALUATION = 1;
        const SIX_M_WALK_TEST = 1 << 1;
        const BERGS_BALANCE_SCALE = 1 << 2;
        const FUNCTIONAL_SCOPE_TEST = 1 << 3;
        const TIME_UP_GO = 1 << 4;
        const COMFORTABLE_AND_FAST_RUNNING_SPEED = 1 << 5;
        const STEP_TEST = 1 << 6;
        const QV_CYSTIC_FIBROSIS = 1 << 7;
        const SF36 = 1 << 8;
        const WHODAS2 = 1 << 9;
        const MIF = 1 << 10;
        const WOMAC = 1 << 11;
        const DASH = 1 << 12;
        const LONDON_SCALE = 1 << 13;
        const EORCT_QLQ_C30 = 1 << 14;
        const SAINT_GEORGE = 1 << 15;
        const BARTHELS_SCALE = 1 << 16;
    }
}

const STRUCTURE_AND_FUNCTION_NAMES: [(StructureAndFunctionTests, &str); 13] = [
    (StructureAndFunctionTests::GONIOMETRY, "Goniometria"),
    (StructureAndFunctionTests::ASHWORTH_SCALE, "Escala de Ashworth"),
    (StructureAndFunctionTests::SENSORY_EVALUATION, "Avaliação Sensorial"),
    (
        StructureAndFunctionTests::RESPIRATORY_MUSCLE_STRENGTH,
        "Força Muscular Respiratória",
    ),
    (StructureAndFunctionTests::SPIROMETRY, "Espirometria"),
    (StructureAndFunctionTests::PEAK_FLOW, "Peak-Flow"),
    (StructureAndFunctionTests::VENTILOMETRY, "Ventilometria"),
    (StructureAndFunctionTests::PAIN_EVALUATION, "Avaliação da Dor"),
    (StructureAndFunctionTests::MUSCLE_STRENGTH, "Força Muscular"),
    (StructureAndFunctionTests::BAROPODOMETRY, "Baropodometria"),
    (StructureAndFunctionTests::ELECTROMYOGRAPHY, "Eletromiografia"),
    (StructureAndFunctionTests::BIOPHOTOGRAMMETRY, "Biofotogrametria"),
    (StructureAndFunctionTests::DYNAMOMETRY, "Dinamometria"),
];

const ACTIVITY_AND_PARTICIPATION_NAMES: [(ActivityAndParticipationTests, &str); 17] = [
    (ActivityAndParticipationTests::MARCH_EVALUATION, "Avaliação de Marcha"),
    (ActivityAndParticipationTests::SIX_M_WALK_TEST, "Teste de Caminhada 6M"),
    (
        ActivityAndParticipationTests::BERGS_BALANCE_SCALE,
        "Escala de Equilíbrio de Berg",
    ),
    (
        ActivityAndParticipationTests::FUNCTIONAL_SCOPE_TEST,
        "Teste do Alcane Funcional",
    ),
    (ActivityAndParticipationTests::TIME_UP_GO, "Time Up Go (TUG)"),
    (
        ActivityAndParticipationTests::COMFORTABLE_AND_FAST_RUNNING_SPEED,
        "Velocidade de marcha confortável e rápida (10m)",
    ),
    (ActivityAndParticipationTests::STEP_TEST, "Teste do Degrau"),
    (ActivityAndParticipationTests::QV_CYSTIC_FIBROSIS, "QV Fibrose Cística"),
    (ActivityAndParticipationTests::SF36, "SF-36"),
    (ActivityAndParticipationTests::WHODAS2, "WHODAS 2.0"),
    (ActivityAndParticipationTests::MIF, "MIF"),
    (ActivityAndParticipationTests::WOMAC, "WOMAC"),
    (ActivityAndParticipationTests::DASH, "DASH"),
    (ActivityAndParticipationTests::LONDON_SCALE, "Escala London"),
    (ActivityAndParticipationTests::EORCT_QLQ_C30, "EORCT QLQ C-30"),
    (ActivityAndParticipationTests::SAINT_GEORGE, "Saint George"),
    (ActivityAndParticipationTests::BARTHELS_SCALE, "Escala de Barthel"),
];

/// Combine display names into a flag set; `None` means no test planned
fn flags_from_names<F: Flags + Copy>(
    names: Option<Vec<String>>,
    table: &[(F, &str)],
    field: &str,
) -> Result<F, ApiError> {
    let Some(names) = names else {
        return Ok(F::empty());
    };
    if names.is_empty() {
        return Err(ApiError::invalid(format!("empty {} list", field)));
    }

    names.iter().try_fold(F::empty(), |acc, name| {
        table
            .iter()
            .find(|(_, display)| *display == name.as_str())
            .map(|(flag, _)| acc.union(*flag))
            .ok_or_else(|| ApiError::invalid(format!("invalid {} value", field)))
    })
}

/// Display names of the set flags in declaration order, `None` when empty
fn flags_to_names<F: Flags + Copy>(
    flags: F,
    table: &[(F, &'static str)],
) -> Option<Vec<&'static str>> {
    let names: Vec<&'static str> = table
        .iter()
        .filter(|(flag, _)| flags.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
    (!names.is_empty()).then_some(names)
}

fn serialize_structure_and_function<S: Serializer>(
    flags: &StructureAndFunctionTests,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    flags_to_names(*flags, &STRUCTURE_AND_FUNCTION_NAMES).serialize(serializer)
}

fn serialize_activity_and_participation<S: Serializer>(
    flags: &ActivityAndParticipationTests,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    flags_to_names(*flags, &ACTIVITY_AND_PARTICIPATION_NAMES).serialize(serializer)
}

// =============================================================================
// Stored forms
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientInformation {
    pub gender: Gender,
    pub birthday: NaiveDate,
    pub acquaintance_phone: String,
    pub address: String,
    pub neighborhood: String,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SociodemographicEvaluation {
    pub civil_status: CivilStatus,
    pub lives_with_status: LivesWith,
    pub education: Education,
    pub occupational_status: OccupationalStatus,
    pub current_job: Option<String>,
    pub last_job: Option<String>,
    pub is_sick: bool,
    pub diseases: Option<Vec<String>>,
    pub is_medicated: bool,
    pub medicines: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KineticFunctionalEvaluation {
    pub clinic_diagnostic: String,
    pub main_complaint: String,
    pub functional_complaint: String,
    pub clinical_history: String,
    pub functional_history: String,
    #[serde(serialize_with = "serialize_structure_and_function")]
    pub structure_and_function: StructureAndFunctionTests,
    #[serde(serialize_with = "serialize_activity_and_participation")]
    pub activity_and_participation: ActivityAndParticipationTests,
    pub physical_functional_tests_results: Option<String>,
    pub complementary_exams_results: Option<String>,
    pub deficiency_diagnosis: Option<String>,
    pub activity_limitation_diagnosis: Option<String>,
    pub participation_restriction_diagnosis: Option<String>,
    pub environment_factors_diagnosis: Option<String>,
    pub functional_objectives_diagnosis: Option<Vec<String>>,
    pub therapeutic_plan_diagnosis: Option<Vec<String>>,
    pub reevaluation_dates: Option<Vec<NaiveDate>>,
    pub academic_assessor: Option<String>,
    pub preceptor_assessor: Option<String>,
}

/// One measurement of a structure-and-function form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Measure {
    #[serde(rename = "type")]
    pub measure_type: Option<MeasureType>,
    pub sensory_type: Option<SensoryType>,
    pub target: Option<String>,
    pub value: String,
    pub date: NaiveDate,
}

/// A structure-and-function form: a kind and its measures, kept sorted by date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructureAndFunction {
    #[serde(rename = "type")]
    pub kind: StructureAndFunctionKind,
    pub measures: Vec<Measure>,
}

impl StructureAndFunction {
    pub fn new(kind: StructureAndFunctionKind, mut measures: Vec<Measure>) -> Self {
        measures.sort_by_key(|m| m.date);
        Self { kind, measures }
    }
}

/// Kind-specific form content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormBody {
    PatientInformation(PatientInformation),
    SociodemographicEvaluation(SociodemographicEvaluation),
    KineticFunctionalEvaluation(KineticFunctionalEvaluation),
    StructureAndFunction(StructureAndFunction),
}

impl FormBody {
    pub fn kind(&self) -> FormKind {
        match self {
            FormBody::PatientInformation(_) => FormKind::PatientInformation,
            FormBody::SociodemographicEvaluation(_) => FormKind::SociodemographicEvaluation,
            FormBody::KineticFunctionalEvaluation(_) => FormKind::KineticFunctionalEvaluation,
            FormBody::StructureAndFunction(form) => form.kind.form_kind(),
        }
    }
}

/// A stored form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormRecord {
    pub id: i64,
    pub user_id: i64,
    #[serde(flatten)]
    pub body: FormBody,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FormRecord {
    pub fn kind(&self) -> FormKind {
        self.body.kind()
    }
}

// =============================================================================
// Request fields
// =============================================================================

/// Request body of a form creation: the target patient plus the form fields
#[derive(Debug, Deserialize)]
pub struct CreateBody<T> {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(flatten)]
    pub fields: T,
}

impl<T> CreateBody<T> {
    pub fn user_id(&self) -> Result<i64, ApiError> {
        self.user_id.ok_or_else(|| missing("user_id"))
    }
}

/// Fields accepted by one form kind
pub trait FormFields: DeserializeOwned + Send + 'static {
    const KIND: FormKind;

    /// Build a new form; every field must be present
    fn into_body(self) -> Result<FormBody, ApiError>;

    /// Merge the present fields into an existing form of the same kind
    fn apply(self, body: &mut FormBody) -> Result<(), ApiError>;
}

fn missing(field: &str) -> ApiError {
    ApiError::invalid(format!("{} field is missing", field))
}

fn take<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| missing(field))
}

fn mismatch(expected: FormKind) -> ApiError {
    ApiError::Internal(format!("stored form is not a {}", expected))
}

fn non_empty_list(list: &Option<Vec<String>>, field: &str) -> Result<(), ApiError> {
    match list {
        Some(items) if items.is_empty() => Err(ApiError::invalid(format!("empty {} list", field))),
        _ => Ok(()),
    }
}

fn birthday(value: &str) -> Result<NaiveDate, ApiError> {
    parse_iso_date(value).ok_or_else(|| ApiError::invalid("malformed birthday date"))
}

fn parse_reevaluation_dates(
    dates: Option<Vec<String>>,
) -> Result<Option<Vec<NaiveDate>>, ApiError> {
    let Some(dates) = dates else {
        return Ok(None);
    };
    if dates.is_empty() {
        return Err(ApiError::invalid("empty reevaluation_dates list"));
    }
    dates
        .iter()
        .map(|d| parse_iso_date(d).ok_or_else(|| ApiError::invalid("reevaluate date is malformed")))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct PatientInformationFields {
    #[serde(default, deserialize_with = "present")]
    pub gender: Option<Gender>,
    #[serde(default, deserialize_with = "present")]
    pub birthday: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub acquaintance_phone: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub neighborhood: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub country: Option<String>,
}

impl FormFields for PatientInformationFields {
    const KIND: FormKind = FormKind::PatientInformation;

    fn into_body(self) -> Result<FormBody, ApiError> {
        let gender = take(self.gender, "gender")?;
        let birthday_text = take(self.birthday, "birthday")?;
        let acquaintance_phone = take(self.acquaintance_phone, "acquaintance_phone")?;
        let address = take(self.address, "address")?;
        let neighborhood = take(self.neighborhood, "neighborhood")?;
        let city = take(self.city, "city")?;
        let country = take(self.country, "country")?;

        Ok(FormBody::PatientInformation(PatientInformation {
            gender,
            birthday: birthday(&birthday_text)?,
            acquaintance_phone,
            address,
            neighborhood,
            city,
            country,
        }))
    }

    fn apply(self, body: &mut FormBody) -> Result<(), ApiError> {
        let FormBody::PatientInformation(form) = body else {
            return Err(mismatch(FormKind::PatientInformation));
        };

        let new_birthday = self.birthday.as_deref().map(birthday).transpose()?;

        if let Some(gender) = self.gender {
            form.gender = gender;
        }
        if let Some(date) = new_birthday {
            form.birthday = date;
        }
        if let Some(value) = self.acquaintance_phone {
            form.acquaintance_phone = value;
        }
        if let Some(value) = self.address {
            form.address = value;
        }
        if let Some(value) = self.neighborhood {
            form.neighborhood = value;
        }
        if let Some(value) = self.city {
            form.city = value;
        }
        if let Some(value) = self.country {
            form.country = value;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SociodemographicEvaluationFields {
    #[serde(default, deserialize_with = "present")]
    pub civil_status: Option<CivilStatus>,
    #[serde(default, deserialize_with = "present")]
    pub lives_with_status: Option<LivesWith>,
    #[serde(default, deserialize_with = "present")]
    pub education: Option<Education>,
    #[serde(default, deserialize_with = "present")]
    pub occupational_status: Option<OccupationalStatus>,
    #[serde(default, deserialize_with = "patch")]
    pub current_job: Option<Option<String>>,
    #[serde(default, deserialize_with = "patch")]
    pub last_job: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub is_sick: Option<bool>,
    #[serde(default, deserialize_with = "patch")]
    pub diseases: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "present")]
    pub is_medicated: Option<bool>,
    #[serde(default, deserialize_with = "patch")]
    pub medicines: Option<Option<Vec<String>>>,
}

impl SociodemographicEvaluationFields {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(diseases) = &self.diseases {
            non_empty_list(diseases, "diseases")?;
        }
        if let Some(medicines) = &self.medicines {
            non_empty_list(medicines, "medicines")?;
        }
        Ok(())
    }
}

impl FormFields for SociodemographicEvaluationFields {
    const KIND: FormKind = FormKind::SociodemographicEvaluation;

    fn into_body(self) -> Result<FormBody, ApiError> {
        let form = SociodemographicEvaluation {
            civil_status: take(self.civil_status, "civil_status")?,
            lives_with_status: take(self.lives_with_status, "lives_with_status")?,
            education: take(self.education, "education")?,
            occupational_status: take(self.occupational_status, "occupational_status")?,
            current_job: take(self.current_job.clone(), "current_job")?,
            last_job: take(self.last_job.clone(), "last_job")?,
            is_sick: take(self.is_sick, "is_sick")?,
            diseases: take(self.diseases.clone(), "diseases")?,
            is_medicated: take(self.is_medicated, "is_medicated")?,
            medicines: take(self.medicines.clone(), "medicines")?,
        };
        self.validate()?;
        Ok(FormBody::SociodemographicEvaluation(form))
    }

    fn apply(self, body: &mut FormBody) -> Result<(), ApiError> {
        let FormBody::SociodemographicEvaluation(form) = body else {
            return Err(mismatch(FormKind::SociodemographicEvaluation));
        };
        self.validate()?;

        if let Some(value) = self.civil_status {
            form.civil_status = value;
        }
        if let Some(value) = self.lives_with_status {
            form.lives_with_status = value;
        }
        if let Some(value) = self.education {
            form.education = value;
        }
        if let Some(value) = self.occupational_status {
            form.occupational_status = value;
        }
        if let Some(value) = self.current_job {
            form.current_job = value;
        }
        if let Some(value) = self.last_job {
            form.last_job = value;
        }
        if let Some(value) = self.is_sick {
            form.is_sick = value;
        }
        if let Some(value) = self.diseases {
            form.diseases = value;
        }
        if let Some(value) = self.is_medicated {
            form.is_medicated = value;
        }
        if let Some(value) = self.medicines {
            form.medicines = value;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct KineticFunctionalEvaluationFields {
    #[serde(default, deserialize_with = "present")]
    pub clinic_diagnostic: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub main_complaint: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub functional_complaint: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub clinical_history: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub functional_history: Option<String>,
    #[serde(default, deserialize_with = "patch")]
    pub structure_and_function: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "patch")]
    pub activity_and_participation: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "patch")]
    pub physical_functional_tests_results: Option<Option<String>>,
    #[serde(default, deserialize_with = "patch")]
    pub complementary_exams_results: Option<Option<String>>,
    #[serde(default, deserialize_with = "patch")]
    pub deficiency_diagnosis: Option<Option<String>>,
    #[serde(default, deserialize_with = "patch")]
    pub activity_limitation_diagnosis: Option<Option<String>>,
    #[serde(default, deserialize_with = "patch")]
    pub participation_restriction_diagnosis: Option<Option<String>>,
    #[serde(default, deserialize_with = "patch")]
    pub environment_factors_diagnosis: Option<Option<String>>,
    #[serde(default, deserialize_with = "patch")]
    pub functional_objectives_diagnosis: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "patch")]
    pub therapeutic_plan_diagnosis: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "patch")]
    pub reevaluation_dates: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "patch")]
    pub academic_assessor: Option<Option<String>>,
    #[serde(default, deserialize_with = "patch")]
    pub preceptor_assessor: Option<Option<String>>,
}

/// Fully validated values of the list fields
struct KineticLists {
    structure_and_function: Option<StructureAndFunctionTests>,
    activity_and_participation: Option<ActivityAndParticipationTests>,
    reevaluation_dates: Option<Option<Vec<NaiveDate>>>,
}

impl KineticFunctionalEvaluationFields {
    fn validate_lists(&mut self) -> Result<KineticLists, ApiError> {
        let structure_and_function = self
            .structure_and_function
            .take()
            .map(|names| {
                flags_from_names(names, &STRUCTURE_AND_FUNCTION_NAMES, "structure_and_function")
            })
            .transpose()?;
        let activity_and_participation = self
            .activity_and_participation
            .take()
            .map(|names| {
                flags_from_names(
                    names,
                    &ACTIVITY_AND_PARTICIPATION_NAMES,
                    "activity_and_participation",
                )
            })
            .transpose()?;

        if let Some(list) = &self.functional_objectives_diagnosis {
            non_empty_list(list, "functional_objectives_diagnosis")?;
        }
        if let Some(list) = &self.therapeutic_plan_diagnosis {
            non_empty_list(list, "therapeutic_plan_diagnosis")?;
        }

        let reevaluation_dates = self
            .reevaluation_dates
            .take()
            .map(parse_reevaluation_dates)
            .transpose()?;

        Ok(KineticLists {
            structure_and_function,
            activity_and_participation,
            reevaluation_dates,
        })
    }
}

impl FormFields for KineticFunctionalEvaluationFields {
    const KIND: FormKind = FormKind::KineticFunctionalEvaluation;

    fn into_body(mut self) -> Result<FormBody, ApiError> {
        let clinic_diagnostic = take(self.clinic_diagnostic.take(), "clinic_diagnostic")?;
        let main_complaint = take(self.main_complaint.take(), "main_complaint")?;
        let functional_complaint = take(self.functional_complaint.take(), "functional_complaint")?;
        let clinical_history = take(self.clinical_history.take(), "clinical_history")?;
        let functional_history = take(self.functional_history.take(), "functional_history")?;
        for (present, field) in [
            (self.structure_and_function.is_some(), "structure_and_function"),
            (self.activity_and_participation.is_some(), "activity_and_participation"),
            (self.reevaluation_dates.is_some(), "reevaluation_dates"),
        ] {
            if !present {
                return Err(missing(field));
            }
        }

        let lists = self.validate_lists()?;

        Ok(FormBody::KineticFunctionalEvaluation(KineticFunctionalEvaluation {
            clinic_diagnostic,
            main_complaint,
            functional_complaint,
            clinical_history,
            functional_history,
            structure_and_function: lists.structure_and_function.unwrap_or_default(),
            activity_and_participation: lists.activity_and_participation.unwrap_or_default(),
            physical_functional_tests_results: take(
                self.physical_functional_tests_results,
                "physical_functional_tests_results",
            )?,
            complementary_exams_results: take(
                self.complementary_exams_results,
                "complementary_exams_results",
            )?,
            deficiency_diagnosis: take(self.deficiency_diagnosis, "deficiency_diagnosis")?,
            activity_limitation_diagnosis: take(
                self.activity_limitation_diagnosis,
                "activity_limitation_diagnosis",
            )?,
            participation_restriction_diagnosis: take(
                self.participation_restriction_diagnosis,
                "participation_restriction_diagnosis",
            )?,
            environment_factors_diagnosis: take(
                self.environment_factors_diagnosis,
                "environment_factors_diagnosis",
            )?,
            functional_objectives_diagnosis: take(
                self.functional_objectives_diagnosis,
                "functional_objectives_diagnosis",
            )?,
            therapeutic_plan_diagnosis: take(
                self.therapeutic_plan_diagnosis,
                "therapeutic_plan_diagnosis",
            )?,
            reevaluation_dates: lists.reevaluation_dates.unwrap_or_default(),
            academic_assessor: take(self.academic_assessor, "academic_assessor")?,
            preceptor_assessor: take(self.preceptor_assessor, "preceptor_assessor")?,
        }))
    }

    fn apply(mut self, body: &mut FormBody) -> Result<(), ApiError> {
        let FormBody::KineticFunctionalEvaluation(form) = body else {
            return Err(mismatch(FormKind::KineticFunctionalEvaluation));
        };
        let lists = self.validate_lists()?;

        if let Some(value) = self.clinic_diagnostic {
            form.clinic_diagnostic = value;
        }
        if let Some(value) = self.main_complaint {
            form.main_complaint = value;
        }
        if let Some(value) = self.functional_complaint {
            form.functional_complaint = value;
        }
        if let Some(value) = self.clinical_history {
            form.clinical_history = value;
        }
        if let Some(value) = self.functional_history {
            form.functional_history = value;
        }
        if let Some(value) = lists.structure_and_function {
            form.structure_and_function = value;
        }
        if let Some(value) = lists.activity_and_participation {
            form.activity_and_participation = value;
        }
        if let Some(value) = self.physical_functional_tests_results {
            form.physical_functional_tests_results = value;
        }
        if let Some(value) = self.complementary_exams_results {
            form.complementary_exams_results = value;
        }
        if let Some(value) = self.deficiency_diagnosis {
            form.deficiency_diagnosis = value;
        }
        if let Some(value) = self.activity_limitation_diagnosis {
            form.activity_limitation_diagnosis = value;
        }
        if let Some(value) = self.participation_restriction_diagnosis {
            form.participation_restriction_diagnosis = value;
        }
        if let Some(value) = self.environment_factors_diagnosis {
            form.environment_factors_diagnosis = value;
        }
        if let Some(value) = self.functional_objectives_diagnosis {
            form.functional_objectives_diagnosis = value;
        }
        if let Some(value) = self.therapeutic_plan_diagnosis {
            form.therapeutic_plan_diagnosis = value;
        }
        if let Some(value) = lists.reevaluation_dates {
            form.reevaluation_dates = value;
        }
        if let Some(value) = self.academic_assessor {
            form.academic_assessor = value;
        }
        if let Some(value) = self.preceptor_assessor {
            form.preceptor_assessor = value;
        }
        Ok(())
    }
}

/// A measure as sent by clients; every key is required, some may be null
#[derive(Debug, Clone, Deserialize)]
pub struct MeasureFields {
    #[serde(rename = "type", deserialize_with = "required")]
    pub measure_type: Option<MeasureType>,
    #[serde(deserialize_with = "required")]
    pub sensory_type: Option<SensoryType>,
    #[serde(deserialize_with = "required")]
    pub target: Option<String>,
    pub value: String,
    pub date: String,
}

impl MeasureFields {
    /// Validate against the rules of `kind`
    pub fn into_measure(self, kind: StructureAndFunctionKind) -> Result<Measure, ApiError> {
        use MeasureType::*;
        use StructureAndFunctionKind::*;

        let invalid_type = || ApiError::invalid("invalid measure type value");
        let invalid_sensory = || ApiError::invalid("invalid measure sensory type value");
        let invalid_target = || ApiError::invalid("invalid measure target value");

        let date = parse_iso_date(&self.date)
            .ok_or_else(|| ApiError::invalid("malformed measure date"))?;

        let type_ok = match kind {
            Goniometry | AshworthScale | MuscleStrength => {
                matches!(self.measure_type, Some(LeftSide | RightSide))
            }
            SensoryEvaluation => matches!(self.measure_type, None | Some(LeftSide | RightSide)),
            RespiratoryMuscleStrength => matches!(
                self.measure_type,
                Some(MaximumInspirationPressure | MaximumExpirationPressure)
            ),
            PainEvaluation => matches!(self.measure_type, Some(PainIntensity)),
        };
        if !type_ok {
            return Err(invalid_type());
        }

        let wants_sensory = kind == SensoryEvaluation;
        if self.sensory_type.is_some() != wants_sensory {
            return Err(invalid_sensory());
        }

        let wants_target = !matches!(kind, RespiratoryMuscleStrength | PainEvaluation);
        if self.target.is_some() != wants_target {
            return Err(invalid_target());
        }

        if kind == PainEvaluation && !is_pain_intensity(&self.value) {
            return Err(ApiError::invalid("invalid measure value value"));
        }

        Ok(Measure {
            measure_type: self.measure_type,
            sensory_type: self.sensory_type,
            target: self.target,
            value: self.value,
            date,
        })
    }
}

fn is_pain_intensity(value: &str) -> bool {
    is_digits(value) && value.parse::<u32>().is_ok_and(|v| v <= 10)
}

/// Fields of a structure-and-function form; the kind comes from the path
#[derive(Debug, Default, Deserialize)]
pub struct StructureAndFunctionFields {
    #[serde(default, deserialize_with = "present")]
    pub measures: Option<Vec<MeasureFields>>,
}

impl StructureAndFunctionFields {
    fn measures(
        measures: Vec<MeasureFields>,
        kind: StructureAndFunctionKind,
    ) -> Result<Vec<Measure>, ApiError> {
        measures.into_iter().map(|m| m.into_measure(kind)).collect()
    }

    pub fn into_form(self, kind: StructureAndFunctionKind) -> Result<FormBody, ApiError> {
        let measures = take(self.measures, "measures")?;
        Ok(FormBody::StructureAndFunction(StructureAndFunction::new(
            kind,
            Self::measures(measures, kind)?,
        )))
    }

    /// Replace the measure set of an existing form
    pub fn apply_to(self, body: &mut FormBody) -> Result<(), ApiError> {
        let FormBody::StructureAndFunction(form) = body else {
            return Err(ApiError::Internal(
                "stored form is not a structure and function form".to_string(),
            ));
        };
        if let Some(measures) = self.measures {
            let kind = form.kind;
            *form = StructureAndFunction::new(kind, Self::measures(measures, kind)?);
        }
        Ok(())
    }
}
