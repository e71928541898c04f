use std::{fmt, str::FromStr};

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(OficioId);

/// How many years (counting the current one) are offered as year filters.
pub const YEAR_CHOICES: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cidade {
    #[default]
    #[serde(rename = "Crateús")]
    Crateus,
    #[serde(rename = "Nova Russas")]
    NovaRussas,
    #[serde(rename = "Ipueiras")]
    Ipueiras,
}

impl Cidade {
    pub const ALL: [Cidade; 3] = [Cidade::Crateus, Cidade::NovaRussas, Cidade::Ipueiras];

    pub fn as_str(self) -> &'static str {
        match self {
            Cidade::Crateus => "Crateús",
            Cidade::NovaRussas => "Nova Russas",
            Cidade::Ipueiras => "Ipueiras",
        }
    }
}

impl fmt::Display for Cidade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCidade(pub String);

impl fmt::Display for UnknownCidade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let allowed: Vec<&str> = Cidade::ALL.iter().map(|c| c.as_str()).collect();
        write!(
            f,
            "unknown cidade '{}' (expected one of: {})",
            self.0,
            allowed.join(", ")
        )
    }
}

impl std::error::Error for UnknownCidade {}

impl FromStr for Cidade {
    type Err = UnknownCidade;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "crateús" | "crateus" => Ok(Cidade::Crateus),
            "nova russas" => Ok(Cidade::NovaRussas),
            "ipueiras" => Ok(Cidade::Ipueiras),
            _ => Err(UnknownCidade(raw.to_string())),
        }
    }
}

/// A stored ofício as the backend returns it.
///
/// `cidade` stays a plain string on the read side so that rows written by
/// other tools with a town outside [`Cidade::ALL`] still list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oficio {
    pub id: OficioId,
    pub numero: i64,
    pub ano: i32,
    pub remetente: String,
    pub destinatario: String,
    pub cidade: String,
    #[serde(default)]
    pub utilizado: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assunto: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_envio: Option<String>,
}

/// Insert payload. `numero` is allocated by the caller before the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOficio {
    pub numero: i64,
    pub ano: i32,
    pub remetente: String,
    pub destinatario: String,
    pub cidade: Cidade,
    pub utilizado: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assunto: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_envio: Option<String>,
}

/// Update payload. Never carries `id`, `numero` or `ano`.
///
/// `descricao` is always sent so it can be cleared; `assunto` and
/// `data_envio` are only sent when set and are otherwise left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OficioChanges {
    pub remetente: String,
    pub destinatario: String,
    pub cidade: Cidade,
    pub utilizado: bool,
    pub descricao: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assunto: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_envio: Option<String>,
}

/// Payload accepted by the `add_oficio` remote function: a record without
/// identity or number, the function assigns both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OficioSubmission {
    pub ano: i32,
    pub remetente: String,
    pub destinatario: String,
    pub cidade: Cidade,
    pub utilizado: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,
}

pub fn current_year() -> i32 {
    Local::now().year()
}

/// Years offered by the year filter, newest first.
pub fn year_choices(current_year: i32) -> Vec<i32> {
    (0..YEAR_CHOICES).map(|offset| current_year - offset).collect()
}
