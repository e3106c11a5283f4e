/// 逐行读取解码后的文本，带一个回退槽。
///
/// 行两端的空白被去掉，空行被跳过。回退槽中的行总是先于底层迭代器被取出。
pub(crate) struct LineReader<'a> {
    lines: std::str::Lines<'a>,
    pushed_back: Option<(usize, &'a str)>,
    line_number: usize,
}

impl<'a> LineReader<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            pushed_back: None,
            line_number: 0,
        }
    }

    pub(crate) fn next_line(&mut self) -> Option<&'a str> {
        if let Some((number, line)) = self.pushed_back.take() {
            self.line_number = number;
            return Some(line);
        }
        for raw in self.lines.by_ref() {
            self.line_number += 1;
            let line = raw.trim();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }

    /// 把刚读到的行放回。同一时刻只能保存一行。
    pub(crate) fn push_back(&mut self, line: &'a str) {
        debug_assert!(self.pushed_back.is_none(), "only one line can be pushed back");
        self.pushed_back = Some((self.line_number, line));
    }

    /// 最近一次返回的行的行号（从 1 开始）。
    #[inline]
    pub(crate) fn line_number(&self) -> usize {
        self.line_number
    }
}

/// 行首关键字：第一个空白之前的部分。
pub(crate) fn split_key(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((key, rest)) => (key, rest.trim()),
        None => (line, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_lines_and_tracks_numbers() {
        let mut reader = LineReader::new("HEADER\n\n   \n  VERSION 4.03  \r\nEND_HEADER");
        assert_eq!(reader.next_line(), Some("HEADER"));
        assert_eq!(reader.line_number(), 1);
        assert_eq!(reader.next_line(), Some("VERSION 4.03"));
        assert_eq!(reader.line_number(), 4);
        assert_eq!(reader.next_line(), Some("END_HEADER"));
        assert_eq!(reader.next_line(), None);
    }

    #[test]
    fn pushed_back_line_comes_first_with_its_number() {
        let mut reader = LineReader::new("L 1 2\n1 0 0 11 1 1;\nC 1 2\nEND_LAYER");
        reader.next_line();
        reader.next_line();
        let next = reader.next_line().expect("contour line");
        assert_eq!(reader.line_number(), 3);
        reader.push_back(next);
        assert_eq!(reader.next_line(), Some("C 1 2"));
        assert_eq!(reader.line_number(), 3);
        assert_eq!(reader.next_line(), Some("END_LAYER"));
        assert_eq!(reader.line_number(), 4);
    }

    #[test]
    fn key_is_token_before_first_space() {
        assert_eq!(split_key("LAYER CADASTER"), ("LAYER", "CADASTER"));
        assert_eq!(split_key("COORDTYPE 1970, Балтийска, K9"), ("COORDTYPE", "1970, Балтийска, K9"));
        assert_eq!(split_key("END_LAYER"), ("END_LAYER", ""));
        assert_eq!(split_key("NAME\tс.Кокаляне"), ("NAME", "с.Кокаляне"));
    }
}
