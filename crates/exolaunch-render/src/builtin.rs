//! Templates compiled into the binary.

const EIGS_XML: &str = include_str!("templates/eigs.xml.j2");
const PERAM_XML: &str = include_str!("templates/peram.xml.j2");
const MESON_XML: &str = include_str!("templates/meson.xml.j2");
const DISCO_XML: &str = include_str!("templates/disco.xml.j2");
const EIGS_SH: &str = include_str!("templates/eigs.sh.j2");
const GPU_SH: &str = include_str!("templates/gpu.sh.j2");
const BINNED_SH: &str = include_str!("templates/binned.sh.j2");
const CONTRACTIONS_SH: &str = include_str!("templates/contractions.sh.j2");

/// `(id, source)` for every builtin template.
///
/// `meson2` reuses the meson sources; the two differ only in their
/// momentum lists and output files.
pub const TEMPLATES: &[(&str, &str)] = &[
    ("eigs.xml", EIGS_XML),
    ("peram.xml", PERAM_XML),
    ("meson.xml", MESON_XML),
    ("meson2.xml", MESON_XML),
    ("disco.xml", DISCO_XML),
    ("eigs.sh", EIGS_SH),
    ("peram.sh", GPU_SH),
    ("meson.sh", GPU_SH),
    ("meson2.sh", GPU_SH),
    ("disco.sh", GPU_SH),
    ("peram_binned.sh", BINNED_SH),
    ("meson_binned.sh", BINNED_SH),
    ("contractions.sh", CONTRACTIONS_SH),
];
