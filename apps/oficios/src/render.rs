use std::fmt::Write as _;

use client_core::format::{format_boolean, format_date, format_numero, sort_label, status_label};
use shared::{
    domain::Oficio,
    protocol::{OficiosResponse, SortSpec},
};

const HEADERS: [&str; 7] = [
    "Nº",
    "Ano",
    "Remetente",
    "Destinatário",
    "Cidade",
    "Status",
    "Envio",
];

fn row(oficio: &Oficio) -> [String; 7] {
    [
        format_numero(oficio.numero),
        oficio.ano.to_string(),
        oficio.remetente.clone(),
        oficio.destinatario.clone(),
        oficio.cidade.clone(),
        status_label(oficio.utilizado).to_string(),
        format_date(oficio.data_envio.as_deref()),
    ]
}

/// Plain-text table of one listing page with its footer.
pub fn render_page(response: &OficiosResponse, sort: SortSpec) -> String {
    let rows: Vec<[String; 7]> = response.data.iter().map(row).collect();

    let mut widths = HEADERS.map(|header| header.chars().count());
    for cells in &rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &HEADERS.map(String::from), &widths);
    for cells in &rows {
        push_line(&mut out, cells, &widths);
    }
    if rows.is_empty() {
        out.push_str("Nenhum ofício encontrado.\n");
    }

    let pagination = response.pagination;
    let _ = writeln!(
        out,
        "Página {} de {} · {} ofício(s) · {}",
        pagination.current_page,
        pagination.total_pages,
        pagination.total_items,
        sort_label(sort)
    );
    out
}

fn push_line(out: &mut String, cells: &[String; 7], widths: &[usize; 7]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect();
    out.push_str(padded.join("  ").trim_end());
    out.push('\n');
}

pub fn render_detail(oficio: &Oficio) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Ofício {}/{}", format_numero(oficio.numero), oficio.ano);
    let _ = writeln!(out, "ID: {}", oficio.id);
    let _ = writeln!(out, "Remetente: {}", oficio.remetente);
    let _ = writeln!(out, "Destinatário: {}", oficio.destinatario);
    let _ = writeln!(out, "Cidade: {}", oficio.cidade);
    let _ = writeln!(out, "Utilizado: {}", format_boolean(Some(oficio.utilizado)));
    if let Some(assunto) = &oficio.assunto {
        let _ = writeln!(out, "Assunto: {assunto}");
    }
    if let Some(descricao) = &oficio.descricao {
        let _ = writeln!(out, "Descrição: {descricao}");
    }
    if oficio.data_envio.is_some() {
        let _ = writeln!(out, "Data de envio: {}", format_date(oficio.data_envio.as_deref()));
    }
    out
}
