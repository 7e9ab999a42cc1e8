//! One HTML table per dataloaf slice.

use super::html::{cell, escape, table, HTML_HEAD};
use crate::dataloaf::{DataLoaf, Slice};
use crate::error::Result;
use std::path::Path;

fn slice_table(slice: &Slice) -> String {
    let columns: Vec<String> = slice.column_names().into_iter().skip(1).collect();
    let rows: Vec<(String, Vec<String>)> = slice
        .feature_ids()
        .iter()
        .enumerate()
        .map(|(row, id)| {
            let cells = columns
                .iter()
                .map(|column| match slice.get(row, column) {
                    Some(value) => cell(value),
                    None => slice
                        .label(column)
                        .map(|labels| labels[row].clone())
                        .unwrap_or_default(),
                })
                .collect();
            (id.clone(), cells)
        })
        .collect();
    table(slice.id_header(), &columns, &rows)
}

/// Write `index.html` with every slice of the package, in name order.
pub fn tabulate(output_dir: &Path, loaf: &DataLoaf) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;

    let mut html = format!("<html>\n{}\n<body>\n", HTML_HEAD);
    let groups = loaf.intercept_groups();
    if !groups.is_empty() {
        html.push_str("<p>Reference levels: ");
        html.push_str(&escape(&groups.join(", ")));
        html.push_str("</p>\n");
    }

    let mut n_slices = 0;
    for slice in loaf.iter_slices(".*")? {
        let slice = slice?;
        html.push_str(&format!("<h2>{}</h2>\n", escape(slice.name())));
        html.push_str(&slice_table(&slice));
        n_slices += 1;
    }
    html.push_str("</body></html>\n");

    std::fs::write(output_dir.join("index.html"), html)?;
    log::info!("Tabulated {} slices into {}", n_slices, output_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloaf::NutritionFacts;
    use tempfile::TempDir;

    #[test]
    fn test_tabulate_lists_slices_in_order() {
        let dir = TempDir::new().unwrap();
        let mut loaf = DataLoaf::create(
            dir.path().join("loaf"),
            NutritionFacts::new("t", vec!["bodysite::gut".into()]),
        )
        .unwrap();
        for name in ["se", "lfc"] {
            let slice = Slice::from_reader(
                "id,(Intercept),bodysitetongue\nf1,1.5,NA\n".as_bytes(),
                name,
            )
            .unwrap();
            loaf.write_slice(&slice).unwrap();
        }

        let out = dir.path().join("viz");
        tabulate(&out, &loaf).unwrap();
        let html = std::fs::read_to_string(out.join("index.html")).unwrap();

        let lfc = html.find("<h2>lfc</h2>").unwrap();
        let se = html.find("<h2>se</h2>").unwrap();
        assert!(lfc < se);
        assert!(html.contains("<th>f1</th><td>1.5</td><td>NA</td>"));
        assert!(html.contains("bodysite::gut"));
    }
}
