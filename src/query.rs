use indexmap::IndexMap;
use regex::Regex;

use crate::section::{Section, SectionFlags};
use crate::symbol::{SectionIndex, Symbol, SymbolBinding, SymbolType};
use crate::Error;

/// This enum selects the ordering of a section query. Both orderings are stable.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub enum SectionOrder {
    /// Order by virtual address.
    #[default]
    ByAddress,

    /// Order by section name.
    ByName,
}

/// This enum decides how a flag mask filters: any shared bit suffices, or every bit of the mask
/// must be present.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum FlagMatch {
    Any(SectionFlags),
    All(SectionFlags),
}

impl FlagMatch {
    fn matches(&self, flags: SectionFlags) -> bool {
        match self {
            Self::Any(mask) => flags.intersects(*mask),
            Self::All(mask) => flags.contains(*mask),
        }
    }
}

/// This structure carries the filters of a section query. Every field is optional; the default
/// filter returns all sections ordered by address.
#[derive(Clone, Copy, Default)]
pub struct SectionFilter<'q> {
    /// Restrict the result to the named sections.
    pub names: Option<&'q [&'q str]>,

    /// Restrict the result to sections whose name matches this regular expression.
    pub name_pattern: Option<&'q str>,

    /// Restrict the result by access flags.
    pub flags: Option<FlagMatch>,

    /// The result ordering.
    pub order: SectionOrder,
}

/// This structure is the query interface over the sections of one parsed file.
pub struct SectionQuery<'p> {
    sections: &'p [Section],
}

impl<'p> SectionQuery<'p> {
    pub(crate) fn new(sections: &'p [Section]) -> Self {
        Self { sections }
    }

    /// This function returns the first section with the specified name.
    pub fn get(&self, name: &str) -> Option<&'p Section> {
        self.sections.iter().find(|section| section.name == name)
    }

    /// This function returns the sections matching the specified filter in the requested
    /// stable order.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Pattern] - The name pattern is not a valid regular expression
    pub fn fetch(&self, filter: &SectionFilter<'_>) -> Result<Vec<&'p Section>, Error> {
        let pattern = filter
            .name_pattern
            .map(Regex::new)
            .transpose()?;
        let mut result: Vec<&Section> = self
            .sections
            .iter()
            .filter(|section| match filter.names {
                Some(names) => names.contains(&section.name.as_str()),
                None => true,
            })
            .filter(|section| match &pattern {
                Some(pattern) => pattern.is_match(&section.name),
                None => true,
            })
            .filter(|section| match filter.flags {
                Some(flags) => flags.matches(section.flags),
                None => true,
            })
            .collect();
        match filter.order {
            SectionOrder::ByAddress => result.sort_by_key(|section| section.address),
            SectionOrder::ByName => result.sort_by(|left, right| left.name.cmp(&right.name)),
        }
        Ok(result)
    }
}

/// This enum selects the secondary ordering of a symbol query; the primary ordering is always
/// by section name.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
pub enum SymbolOrder {
    /// Order by symbol value (address).
    #[default]
    ByValue,

    /// Order by symbol name.
    ByName,
}

/// This structure carries the filters of a symbol query. Every field is optional; the default
/// filter returns all symbols ordered by section and value.
#[derive(Clone, Copy, Default)]
pub struct SymbolFilter<'q> {
    /// Restrict the result to symbols defined in the named sections.
    pub sections: Option<&'q [&'q str]>,

    /// Restrict the result to symbols whose name matches this regular expression.
    pub name_pattern: Option<&'q str>,

    /// Restrict the result to the named symbols.
    pub names: Option<&'q [&'q str]>,

    /// Restrict the result to symbols with one of these bindings.
    pub bindings: Option<&'q [SymbolBinding]>,

    /// Restrict the result to symbols whose owning section carries one of these access flags.
    pub access: Option<SectionFlags>,

    /// Restrict the result to symbols with one of these types.
    pub types: Option<&'q [SymbolType]>,

    /// The secondary result ordering.
    pub order: SymbolOrder,
}

/// This structure is the query interface over the symbols of one parsed file.
pub struct SymbolQuery<'p> {
    symbols: &'p [Symbol],
}

impl<'p> SymbolQuery<'p> {
    pub(crate) fn new(symbols: &'p [Symbol]) -> Self {
        Self { symbols }
    }

    /// This function returns the first symbol with the specified name, optionally restricted to
    /// a single section.
    pub fn get(&self, name: &str, section_name: Option<&str>) -> Option<&'p Symbol> {
        self.symbols.iter().find(|symbol| {
            symbol.name == name
                && section_name
                    .map(|section| symbol.section_name == section)
                    .unwrap_or(true)
        })
    }

    /// This function returns the symbols matching the specified filter, ordered by section name
    /// and then by value or name.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Pattern] - The name pattern is not a valid regular expression
    pub fn fetch(&self, filter: &SymbolFilter<'_>) -> Result<Vec<&'p Symbol>, Error> {
        let pattern = filter
            .name_pattern
            .map(Regex::new)
            .transpose()?;
        let mut result: Vec<&Symbol> = self
            .symbols
            .iter()
            .filter(|symbol| match filter.sections {
                Some(sections) => sections.contains(&symbol.section_name.as_str()),
                None => true,
            })
            .filter(|symbol| match filter.names {
                Some(names) => names.contains(&symbol.name.as_str()),
                None => true,
            })
            .filter(|symbol| match filter.bindings {
                Some(bindings) => bindings.contains(&symbol.binding),
                None => true,
            })
            .filter(|symbol| match filter.access {
                Some(mask) => symbol.access.intersects(mask),
                None => true,
            })
            .filter(|symbol| match filter.types {
                Some(types) => types.contains(&symbol.ty),
                None => true,
            })
            .filter(|symbol| match &pattern {
                Some(pattern) => pattern.is_match(&symbol.name),
                None => true,
            })
            .collect();
        match filter.order {
            SymbolOrder::ByValue => result.sort_by(|left, right| {
                (&left.section_name, left.value).cmp(&(&right.section_name, right.value))
            }),
            SymbolOrder::ByName => result.sort_by(|left, right| {
                (&left.section_name, &left.name).cmp(&(&right.section_name, &right.name))
            }),
        }
        Ok(result)
    }

    /// This function returns the matching symbols grouped by section name. Groups appear in the
    /// order their first symbol appears in the ordered result; empty groups are dropped.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Pattern] - The name pattern is not a valid regular expression
    pub fn fetch_grouped(
        &self,
        filter: &SymbolFilter<'_>,
    ) -> Result<IndexMap<String, Vec<&'p Symbol>>, Error> {
        let mut groups: IndexMap<String, Vec<&Symbol>> = IndexMap::new();
        for symbol in self.fetch(filter)? {
            groups
                .entry(symbol.section_name.clone())
                .or_default()
                .push(symbol);
        }
        Ok(groups)
    }

    /// This function returns the toolchain marker symbols: absolute symbols with a non-empty
    /// name starting with an underscore and type `NOTYPE`, ordered by value. Linkers and
    /// runtime startup code publish layout boundaries (`_etext`, `__bss_start__` and friends)
    /// this way.
    pub fn fetch_gcc_special(&self) -> Vec<&'p Symbol> {
        let mut result: Vec<&Symbol> = self
            .symbols
            .iter()
            .filter(|symbol| symbol.section_index == SectionIndex::Abs)
            .filter(|symbol| symbol.name.starts_with('_'))
            .filter(|symbol| symbol.ty == SymbolType::NoType)
            .collect();
        result.sort_by_key(|symbol| symbol.value);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::SectionType;
    use crate::symbol::SymbolVisibility;

    fn section(index: usize, name: &str, address: u64, flags: SectionFlags) -> Section {
        Section {
            index,
            name: name.to_string(),
            name_index: 0,
            ty: SectionType::ProgBits,
            flags,
            address,
            offset: 0,
            size: 16,
            link: 0,
            info: 0,
            alignment: 4,
            entry_size: 0,
            image: None,
        }
    }

    fn symbol(
        name: &str,
        section_name: &str,
        value: u64,
        binding: SymbolBinding,
        ty: SymbolType,
        section_index: SectionIndex,
        access: SectionFlags,
    ) -> Symbol {
        Symbol {
            name_index: 0,
            name: name.to_string(),
            value,
            size: 0,
            binding,
            ty,
            visibility: SymbolVisibility::Default,
            section_index,
            section_name: section_name.to_string(),
            access,
        }
    }

    fn sections() -> Vec<Section> {
        vec![
            section(0, ".data", 0x3000, SectionFlags::ALLOC | SectionFlags::WRITE),
            section(1, ".text", 0x1000, SectionFlags::ALLOC | SectionFlags::EXECINSTR),
            section(2, ".debug_info", 0, SectionFlags::empty()),
        ]
    }

    fn symbols() -> Vec<Symbol> {
        vec![
            symbol(
                "main",
                ".text",
                0x1010,
                SymbolBinding::Global,
                SymbolType::Func,
                SectionIndex::Normal(1),
                SectionFlags::ALLOC | SectionFlags::EXECINSTR,
            ),
            symbol(
                "counter",
                ".data",
                0x3000,
                SymbolBinding::Local,
                SymbolType::Object,
                SectionIndex::Normal(0),
                SectionFlags::ALLOC | SectionFlags::WRITE,
            ),
            symbol(
                "helper",
                ".text",
                0x1000,
                SymbolBinding::Local,
                SymbolType::Func,
                SectionIndex::Normal(1),
                SectionFlags::ALLOC | SectionFlags::EXECINSTR,
            ),
            symbol(
                "_etext",
                "ABS",
                0x2000,
                SymbolBinding::Global,
                SymbolType::NoType,
                SectionIndex::Abs,
                SectionFlags::empty(),
            ),
            symbol(
                "__bss_start__",
                "ABS",
                0x4000,
                SymbolBinding::Global,
                SymbolType::NoType,
                SectionIndex::Abs,
                SectionFlags::empty(),
            ),
        ]
    }

    #[test]
    fn sections_order_by_address_and_by_name() {
        let sections = sections();
        let query = SectionQuery::new(&sections);
        let by_address = query.fetch(&SectionFilter::default()).unwrap();
        assert_eq!(
            by_address.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec![".debug_info", ".text", ".data"]
        );
        let by_name = query
            .fetch(&SectionFilter { order: SectionOrder::ByName, ..Default::default() })
            .unwrap();
        assert_eq!(
            by_name.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec![".data", ".debug_info", ".text"]
        );
    }

    #[test]
    fn sections_filter_by_regex_and_flags() {
        let sections = sections();
        let query = SectionQuery::new(&sections);
        let debug = query
            .fetch(&SectionFilter { name_pattern: Some(r"^\.debug"), ..Default::default() })
            .unwrap();
        assert_eq!(debug.len(), 1);
        assert_eq!(debug[0].name, ".debug_info");

        let executable = query
            .fetch(&SectionFilter {
                flags: Some(FlagMatch::All(SectionFlags::ALLOC | SectionFlags::EXECINSTR)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(executable.len(), 1);
        assert_eq!(executable[0].name, ".text");

        let any_write_or_exec = query
            .fetch(&SectionFilter {
                flags: Some(FlagMatch::Any(SectionFlags::WRITE | SectionFlags::EXECINSTR)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(any_write_or_exec.len(), 2);
    }

    #[test]
    fn symbols_filter_by_binding_type_and_access() {
        let symbols = symbols();
        let query = SymbolQuery::new(&symbols);

        let locals = query
            .fetch(&SymbolFilter {
                bindings: Some(&[SymbolBinding::Local]),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(locals.len(), 2);

        let functions_in_text = query
            .fetch(&SymbolFilter {
                sections: Some(&[".text"]),
                types: Some(&[SymbolType::Func]),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            functions_in_text.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["helper", "main"] // ordered by value within the section
        );

        let writable = query
            .fetch(&SymbolFilter {
                access: Some(SectionFlags::WRITE),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(writable.len(), 1);
        assert_eq!(writable[0].name, "counter");
    }

    #[test]
    fn grouping_preserves_insertion_order_of_sections() {
        let symbols = symbols();
        let query = SymbolQuery::new(&symbols);
        let grouped = query.fetch_grouped(&SymbolFilter::default()).unwrap();
        let keys: Vec<&str> = grouped.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![".data", ".text", "ABS"]);
        assert_eq!(grouped["ABS"].len(), 2);
        assert_eq!(grouped[".text"][0].name, "helper");
    }

    #[test]
    fn gcc_special_symbols_are_absolute_underscore_notype() {
        let symbols = symbols();
        let query = SymbolQuery::new(&symbols);
        let special = query.fetch_gcc_special();
        assert_eq!(
            special.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["_etext", "__bss_start__"] // ordered by value
        );
    }

    #[test]
    fn name_regex_and_exact_list_compose() {
        let symbols = symbols();
        let query = SymbolQuery::new(&symbols);
        let result = query
            .fetch(&SymbolFilter {
                name_pattern: Some("^_"),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(result.len(), 2);

        let picked = query
            .fetch(&SymbolFilter {
                names: Some(&["main", "counter"]),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn invalid_patterns_surface_as_typed_errors() {
        let symbols = symbols();
        let query = SymbolQuery::new(&symbols);
        assert!(matches!(
            query.fetch(&SymbolFilter { name_pattern: Some("("), ..Default::default() }),
            Err(Error::Pattern(_))
        ));
    }
}
