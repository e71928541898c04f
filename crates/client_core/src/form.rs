use shared::domain::{Cidade, NewOficio, Oficio, OficioChanges, OficioSubmission};

use crate::{error::OficioError, format::parse_data_envio};

/// Editable ofício fields as an operator fills them in.
///
/// Text stays raw until submission; [`OficioForm::validate`] is the only
/// gate between the form and a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OficioForm {
    pub ano: Option<i32>,
    pub remetente: String,
    pub destinatario: String,
    pub cidade: String,
    pub utilizado: bool,
    pub descricao: String,
    pub assunto: String,
    pub data_envio: String,
}

/// A form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    pub ano: i32,
    pub remetente: String,
    pub destinatario: String,
    pub cidade: Cidade,
    pub utilizado: bool,
    pub descricao: Option<String>,
    pub assunto: Option<String>,
    pub data_envio: Option<String>,
}

impl OficioForm {
    /// Blank creation form: year fixed to `current_year`, default town, unused.
    pub fn new(current_year: i32) -> Self {
        Self {
            ano: Some(current_year),
            remetente: String::new(),
            destinatario: String::new(),
            cidade: Cidade::default().as_str().to_string(),
            utilizado: false,
            descricao: String::new(),
            assunto: String::new(),
            data_envio: String::new(),
        }
    }

    pub fn reset(&mut self, current_year: i32) {
        *self = Self::new(current_year);
    }

    /// Edit form pre-populated from a stored record.
    pub fn from_oficio(oficio: &Oficio) -> Self {
        Self {
            ano: Some(oficio.ano),
            remetente: oficio.remetente.clone(),
            destinatario: oficio.destinatario.clone(),
            cidade: oficio.cidade.clone(),
            utilizado: oficio.utilizado,
            descricao: oficio.descricao.clone().unwrap_or_default(),
            assunto: oficio.assunto.clone().unwrap_or_default(),
            data_envio: oficio.data_envio.clone().unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<ValidatedForm, OficioError> {
        let mut missing = Vec::new();
        if self.ano.is_none() {
            missing.push("ano");
        }
        if self.remetente.trim().is_empty() {
            missing.push("remetente");
        }
        if self.destinatario.trim().is_empty() {
            missing.push("destinatario");
        }
        if !missing.is_empty() {
            return Err(OficioError::validation(format!(
                "campos obrigatórios ausentes: {}",
                missing.join(", ")
            )));
        }

        let cidade: Cidade = self
            .cidade
            .parse()
            .map_err(|err| OficioError::validation(format!("{err}")))?;

        let data_envio = optional_text(&self.data_envio);
        if let Some(raw) = &data_envio {
            if parse_data_envio(raw).is_none() {
                return Err(OficioError::validation(format!(
                    "data de envio inválida: '{raw}'"
                )));
            }
        }

        Ok(ValidatedForm {
            ano: self.ano.unwrap_or_default(),
            remetente: self.remetente.trim().to_string(),
            destinatario: self.destinatario.trim().to_string(),
            cidade,
            utilizado: self.utilizado,
            descricao: optional_text(&self.descricao),
            assunto: optional_text(&self.assunto),
            data_envio,
        })
    }
}

impl ValidatedForm {
    pub fn into_new_oficio(self, numero: i64) -> NewOficio {
        NewOficio {
            numero,
            ano: self.ano,
            remetente: self.remetente,
            destinatario: self.destinatario,
            cidade: self.cidade,
            utilizado: self.utilizado,
            descricao: self.descricao,
            assunto: self.assunto,
            data_envio: self.data_envio,
        }
    }

    /// Drops `ano`: the update path never rewrites it.
    pub fn into_changes(self) -> OficioChanges {
        OficioChanges {
            remetente: self.remetente,
            destinatario: self.destinatario,
            cidade: self.cidade,
            utilizado: self.utilizado,
            descricao: self.descricao,
            assunto: self.assunto,
            data_envio: self.data_envio,
        }
    }

    pub fn into_submission(self) -> OficioSubmission {
        OficioSubmission {
            ano: self.ano,
            remetente: self.remetente,
            destinatario: self.destinatario,
            cidade: self.cidade,
            utilizado: self.utilizado,
            descricao: self.descricao,
        }
    }
}

fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
