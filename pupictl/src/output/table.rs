use tabled::{Table, settings::Style};

/// The common look of every table printed by pupictl
pub(crate) trait PupictlTable {
    fn styled(&mut self) -> &mut Self;
}

impl PupictlTable for Table {
    fn styled(&mut self) -> &mut Self {
        self.with(Style::rounded())
    }
}
