use std::fs;
use std::path::{Path, PathBuf};

pub const FIXTURE_LINES: [&str; 25] = [
    "AAAAAAA",
    "BBBBBBBBBB",
    "CCCCCCCCCCCC",
    "DDDDDDDDDDDDDDD",
    "EEEEEEEEE",
    "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF",
    "HHHHHHHHHHHHHHHHH",
    "GGGGGGGGGGGGGGGGGGGGG",
    "JJJJJJJJJJJJJJJJJJJJJJJJJJ",
    "III",
    "KKKKKKKKKKKKKKKKKKKKKKKKKKK",
    "LLLLLLL",
    "M",
    "N",
    "OOOOOOOOOOOO",
    "PPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPP",
    "RRRRRRRRRR",
    "SSSSSSSSSSSSS",
    "TTTTTTTTTTTTTTTTTTT",
    "QQQQQQQQQ",
    "UUUUUUUUU",
    "ZZZZZZZZZZZZZZZZ",
    "XXXXXXXXX",
    "YYYYYYYYYYYYYY",
    "W",
];

/// Write the 25-line fixture into `dir` and return its path
pub fn write_fixture(dir: &Path) -> PathBuf {
    let mut contents = FIXTURE_LINES.join("\n");
    contents.push('\n');
    write_text(dir, "fixture.txt", contents.as_bytes())
}

pub fn write_text(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}
