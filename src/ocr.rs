use std::io::Write;
use std::process::{Command, Stdio};

use crate::bbox::{BBox, Ltwh};
use crate::error::Error;

/// One recognized text fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCandidate {
    pub region: BBox<Ltwh>,
    pub text: String,
    // 0..1
    pub confidence: f32,
}

impl TextCandidate {
    pub fn new<S: Into<String>>(region: BBox<Ltwh>, text: S, confidence: f32) -> Self {
        Self {
            region,
            text: text.into(),
            confidence,
        }
    }
}

/// OCR engine over images of type `I`. Candidates carry no ordering
/// guarantee beyond the order the engine reports them in.
pub trait TextRecognizer<I: ?Sized> {
    fn recognize(&mut self, image: &I) -> Result<Vec<TextCandidate>, Error>;
}

impl<I: ?Sized, R: TextRecognizer<I> + ?Sized> TextRecognizer<I> for Box<R> {
    #[inline]
    fn recognize(&mut self, image: &I) -> Result<Vec<TextCandidate>, Error> {
        (**self).recognize(image)
    }
}

/// Runs the `tesseract` command line tool on PNG-encoded images.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: String,
    lang: String,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractCli {
    pub fn new<S: ToString>(program: S) -> Self {
        Self {
            program: program.to_string(),
            lang: "eng".to_string(),
        }
    }

    pub fn with_lang<S: ToString>(mut self, lang: S) -> Self {
        self.lang = lang.to_string();
        self
    }

    pub fn recognize_png(&self, png: &[u8]) -> Result<Vec<TextCandidate>, Error> {
        let mut child = Command::new(&self.program)
            .args(["stdin", "stdout", "-l", self.lang.as_str(), "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Ocr(format!("failed to start {}: {}", self.program, e)))?;

        // The child may exit without reading its input; it is reaped and its
        // exit status reported before the write error.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(png),
            None => Ok(()),
        };

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(Error::Ocr(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        written?;

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Groups the word rows of tesseract TSV output into one candidate per text
/// line, in reading order.
pub fn parse_tsv(tsv: &str) -> Vec<TextCandidate> {
    struct Line {
        key: (u32, u32, u32),
        words: Vec<String>,
        conf_sum: f32,
        ltrb: [f32; 4],
    }

    let mut lines: Vec<Line> = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }

        let text = cols[11].trim();
        let nums: Option<Vec<f32>> = cols[2..11].iter().map(|c| c.trim().parse().ok()).collect();
        let nums = match nums {
            Some(nums) if !text.is_empty() && nums[8] >= 0.0 => nums,
            _ => continue,
        };

        let key = (nums[0] as u32, nums[1] as u32, nums[2] as u32);
        let (l, t, w, h) = (nums[4], nums[5], nums[6], nums[7]);

        match lines.iter_mut().find(|line| line.key == key) {
            Some(line) => {
                line.words.push(text.to_string());
                line.conf_sum += nums[8];
                line.ltrb = [
                    line.ltrb[0].min(l),
                    line.ltrb[1].min(t),
                    line.ltrb[2].max(l + w),
                    line.ltrb[3].max(t + h),
                ];
            }
            None => lines.push(Line {
                key,
                words: vec![text.to_string()],
                conf_sum: nums[8],
                ltrb: [l, t, l + w, t + h],
            }),
        }
    }

    lines
        .into_iter()
        .map(|line| {
            let [l, t, r, b] = line.ltrb;
            TextCandidate::new(
                BBox::ltwh(l, t, r - l, b - t),
                line.words.join(" "),
                line.conf_sum / line.words.len() as f32 / 100.0,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t200\t80\t-1\t
4\t1\t1\t1\t1\t0\t10\t10\t150\t30\t-1\t
5\t1\t1\t1\t1\t1\t10\t10\t60\t30\t90\tab-12
5\t1\t1\t1\t1\t2\t80\t12\t80\t28\t80\tcd!
5\t1\t1\t1\t2\t1\t10\t50\t20\t20\t70\tx
5\t1\t1\t1\t2\t2\t40\t50\t20\t20\t-1\t
";

    #[test]
    fn groups_words_by_line() {
        let candidates = parse_tsv(TSV);
        assert_eq!(candidates.len(), 2);

        assert_eq!(candidates[0].text, "ab-12 cd!");
        assert_abs_diff_eq!(candidates[0].confidence, 0.85, epsilon = 1e-5);
        assert_eq!(candidates[0].region, BBox::ltwh(10.0, 10.0, 150.0, 30.0));

        assert_eq!(candidates[1].text, "x");
    }

    #[test]
    fn empty_output_has_no_candidates() {
        assert!(parse_tsv("").is_empty());
        assert!(parse_tsv("level\tpage_num\n").is_empty());
    }

    /// Zombie children of this process, from `/proc/<pid>/stat`.
    #[cfg(target_os = "linux")]
    fn zombie_children() -> usize {
        let me = std::process::id().to_string();

        std::fs::read_dir("/proc")
            .unwrap()
            .filter_map(|e| std::fs::read_to_string(e.ok()?.path().join("stat")).ok())
            .filter(|stat| {
                // "pid (comm) state ppid ..."
                let rest = match stat.rfind(')') {
                    Some(pos) => &stat[pos + 1..],
                    None => return false,
                };
                let mut fields = rest.split_whitespace();
                fields.next() == Some("Z") && fields.next() == Some(me.as_str())
            })
            .count()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn engine_exiting_early_is_reaped_and_reported() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("qtraffic-ocr-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let script = dir.join("tesseract");
        std::fs::write(
            &script,
            "#!/bin/sh\necho 'Failed loading language xx' >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let ocr = TesseractCli::new(script.display()).with_lang("xx");
        let png = vec![0u8; 4 << 20];
        let before = zombie_children();

        for _ in 0..3 {
            match ocr.recognize_png(&png) {
                Err(Error::Ocr(msg)) => assert!(msg.contains("Failed loading language xx")),
                other => panic!("unexpected result: {:?}", other),
            }
        }

        assert_eq!(zombie_children(), before);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_engine_is_an_ocr_error() {
        let ocr = TesseractCli::new("/nonexistent/qtraffic-tesseract");
        assert!(matches!(ocr.recognize_png(&[]), Err(Error::Ocr(_))));
    }
}
