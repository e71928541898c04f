use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::Oficio;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    #[default]
    Numero,
    Ano,
    Remetente,
    Destinatario,
    Cidade,
    Utilizado,
}

impl SortField {
    /// Fields offered by the sort menu, in display order.
    pub const OPTIONS: [SortField; 4] = [
        SortField::Numero,
        SortField::Ano,
        SortField::Remetente,
        SortField::Destinatario,
    ];

    /// Column name on the backend table.
    pub fn column(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Numero => "numero",
            SortField::Ano => "ano",
            SortField::Remetente => "remetente",
            SortField::Destinatario => "destinatario",
            SortField::Cidade => "cidade",
            SortField::Utilizado => "utilizado",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortField::Id => "Ordenar por ID",
            SortField::Numero => "Ordenar por Número",
            SortField::Ano => "Ordenar por Ano",
            SortField::Remetente => "Ordenar por Remetente",
            SortField::Destinatario => "Ordenar por Destinatário",
            SortField::Cidade => "Ordenar por Cidade",
            SortField::Utilizado => "Ordenar por Status",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(SortField::Id),
            "numero" => Ok(SortField::Numero),
            "ano" => Ok(SortField::Ano),
            "remetente" => Ok(SortField::Remetente),
            "destinatario" => Ok(SortField::Destinatario),
            "cidade" => Ok(SortField::Cidade),
            "utilizado" => Ok(SortField::Utilizado),
            other => Err(format!("unknown sort field '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(format!("unknown sort direction '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Sort menu behaviour: picking the active field while ascending flips to
    /// descending, every other pick sorts ascending.
    pub fn toggled(self, field: SortField) -> Self {
        let direction = if field == self.field && self.direction == SortDirection::Asc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        Self { field, direction }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OficioFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_used: Option<bool>,
}

impl OficioFilters {
    /// Search term with surrounding whitespace removed; blank terms are inactive.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.search_term().is_none() && self.year.is_none() && self.is_used.is_none()
    }
}

/// Zero-based offset window of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub offset: u64,
    pub limit: u32,
}

impl PageRange {
    /// Page `page` (1-based) of size `page_size`; both are clamped to at least 1.
    pub fn for_page(page: u32, page_size: u32) -> Self {
        let page = page.max(1);
        let limit = page_size.max(1);
        Self {
            offset: u64::from(page - 1) * u64::from(limit),
            limit,
        }
    }

    /// Inclusive index of the last row in the window.
    pub fn last_index(&self) -> u64 {
        self.offset + u64::from(self.limit) - 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OficioQuery {
    pub filters: OficioFilters,
    pub sort: SortSpec,
    pub range: PageRange,
}

/// One page of rows plus the exact number of rows matching the filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OficioPage {
    pub records: Vec<Oficio>,
    pub total_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            total_items: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OficiosResponse {
    pub data: Vec<Oficio>,
    pub pagination: Pagination,
}

/// `ceil(total / page_size)`, never below 1.
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = total_count.div_ceil(page_size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}
