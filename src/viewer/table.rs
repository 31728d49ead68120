use crate::store::Post;

const HEADERS: [&str; 4] = ["ID", "User ID", "Title", "Content"];

/// Render posts as a plain-text table.
pub fn render_table(posts: &[Post]) -> String {
    if posts.is_empty() {
        return "No posts available\n".to_string();
    }

    let rows: Vec<[&str; 4]> = posts
        .iter()
        .map(|p| {
            let owner = if p.owner_id.trim().is_empty() {
                "Anonymous"
            } else {
                p.owner_id.as_str()
            };
            [p.id.as_str(), owner, p.title.as_str(), p.content.as_str()]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[&str; 4], widths: &[usize; 4]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    out.push_str(padded.join(" | ").trim_end());
    out.push('\n');
}
