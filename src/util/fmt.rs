use std::io::{self, Write};

pub mod tree;

const INDENT_WIDTH: usize = 2;

fn sp(w: &mut impl Write, i: usize) -> io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

/// Renders a tree printer into a string.
fn render(print: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
    let mut buf = Vec::with_capacity(1024);
    // Writes into a `Vec` never fail.
    let _ = print(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}
