use serde::{Deserialize, Serialize};

/// This enum represents the tag of a debug information entry. Vendor tags between `lo_user` and
/// `hi_user` are preserved in [Tag::User], every other unregistered value in [Tag::Unknown].
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub enum Tag {
    ArrayType,
    ClassType,
    EntryPoint,
    EnumerationType,
    FormalParameter,
    ImportedDeclaration,
    Label,
    LexicalBlock,
    Member,
    PointerType,
    ReferenceType,
    CompileUnit,
    StringType,
    StructureType,
    SubroutineType,
    Typedef,
    UnionType,
    UnspecifiedParameters,
    Variant,
    CommonBlock,
    CommonInclusion,
    Inheritance,
    InlinedSubroutine,
    Module,
    PtrToMemberType,
    SetType,
    SubrangeType,
    WithStmt,
    AccessDeclaration,
    BaseType,
    CatchBlock,
    ConstType,
    Constant,
    Enumerator,
    FileType,
    Friend,
    Namelist,
    NamelistItem,
    PackedType,
    Subprogram,
    TemplateTypeParameter,
    TemplateValueParameter,
    ThrownType,
    TryBlock,
    VariantPart,
    Variable,
    VolatileType,
    DwarfProcedure,
    RestrictType,
    InterfaceType,
    Namespace,
    ImportedModule,
    UnspecifiedType,
    PartialUnit,
    ImportedUnit,
    Condition,
    SharedType,
    TypeUnit,
    RvalueReferenceType,
    TemplateAlias,
    CoarrayType,
    GenericSubrange,
    DynamicType,
    AtomicType,
    CallSite,
    CallSiteParameter,
    SkeletonUnit,
    ImmutableType,
    User(u64),
    Unknown(u64),
}

impl From<u64> for Tag {
    fn from(value: u64) -> Self {
        match value {
            0x01 => Self::ArrayType,
            0x02 => Self::ClassType,
            0x03 => Self::EntryPoint,
            0x04 => Self::EnumerationType,
            0x05 => Self::FormalParameter,
            0x08 => Self::ImportedDeclaration,
            0x0A => Self::Label,
            0x0B => Self::LexicalBlock,
            0x0D => Self::Member,
            0x0F => Self::PointerType,
            0x10 => Self::ReferenceType,
            0x11 => Self::CompileUnit,
            0x12 => Self::StringType,
            0x13 => Self::StructureType,
            0x15 => Self::SubroutineType,
            0x16 => Self::Typedef,
            0x17 => Self::UnionType,
            0x18 => Self::UnspecifiedParameters,
            0x19 => Self::Variant,
            0x1A => Self::CommonBlock,
            0x1B => Self::CommonInclusion,
            0x1C => Self::Inheritance,
            0x1D => Self::InlinedSubroutine,
            0x1E => Self::Module,
            0x1F => Self::PtrToMemberType,
            0x20 => Self::SetType,
            0x21 => Self::SubrangeType,
            0x22 => Self::WithStmt,
            0x23 => Self::AccessDeclaration,
            0x24 => Self::BaseType,
            0x25 => Self::CatchBlock,
            0x26 => Self::ConstType,
            0x27 => Self::Constant,
            0x28 => Self::Enumerator,
            0x29 => Self::FileType,
            0x2A => Self::Friend,
            0x2B => Self::Namelist,
            0x2C => Self::NamelistItem,
            0x2D => Self::PackedType,
            0x2E => Self::Subprogram,
            0x2F => Self::TemplateTypeParameter,
            0x30 => Self::TemplateValueParameter,
            0x31 => Self::ThrownType,
            0x32 => Self::TryBlock,
            0x33 => Self::VariantPart,
            0x34 => Self::Variable,
            0x35 => Self::VolatileType,
            0x36 => Self::DwarfProcedure,
            0x37 => Self::RestrictType,
            0x38 => Self::InterfaceType,
            0x39 => Self::Namespace,
            0x3A => Self::ImportedModule,
            0x3B => Self::UnspecifiedType,
            0x3C => Self::PartialUnit,
            0x3D => Self::ImportedUnit,
            0x3F => Self::Condition,
            0x40 => Self::SharedType,
            0x41 => Self::TypeUnit,
            0x42 => Self::RvalueReferenceType,
            0x43 => Self::TemplateAlias,
            0x44 => Self::CoarrayType,
            0x45 => Self::GenericSubrange,
            0x46 => Self::DynamicType,
            0x47 => Self::AtomicType,
            0x48 => Self::CallSite,
            0x49 => Self::CallSiteParameter,
            0x4A => Self::SkeletonUnit,
            0x4B => Self::ImmutableType,
            value @ 0x4080..=0xFFFF => Self::User(value),
            value => Self::Unknown(value),
        }
    }
}

impl Tag {
    /// This function returns the short name of the tag, the `DW_TAG_` prefix stripped. Unknown
    /// tags render with their numeric value.
    pub fn name(&self) -> String {
        let name = match self {
            Self::ArrayType => "array_type",
            Self::ClassType => "class_type",
            Self::EntryPoint => "entry_point",
            Self::EnumerationType => "enumeration_type",
            Self::FormalParameter => "formal_parameter",
            Self::ImportedDeclaration => "imported_declaration",
            Self::Label => "label",
            Self::LexicalBlock => "lexical_block",
            Self::Member => "member",
            Self::PointerType => "pointer_type",
            Self::ReferenceType => "reference_type",
            Self::CompileUnit => "compile_unit",
            Self::StringType => "string_type",
            Self::StructureType => "structure_type",
            Self::SubroutineType => "subroutine_type",
            Self::Typedef => "typedef",
            Self::UnionType => "union_type",
            Self::UnspecifiedParameters => "unspecified_parameters",
            Self::Variant => "variant",
            Self::CommonBlock => "common_block",
            Self::CommonInclusion => "common_inclusion",
            Self::Inheritance => "inheritance",
            Self::InlinedSubroutine => "inlined_subroutine",
            Self::Module => "module",
            Self::PtrToMemberType => "ptr_to_member_type",
            Self::SetType => "set_type",
            Self::SubrangeType => "subrange_type",
            Self::WithStmt => "with_stmt",
            Self::AccessDeclaration => "access_declaration",
            Self::BaseType => "base_type",
            Self::CatchBlock => "catch_block",
            Self::ConstType => "const_type",
            Self::Constant => "constant",
            Self::Enumerator => "enumerator",
            Self::FileType => "file_type",
            Self::Friend => "friend",
            Self::Namelist => "namelist",
            Self::NamelistItem => "namelist_item",
            Self::PackedType => "packed_type",
            Self::Subprogram => "subprogram",
            Self::TemplateTypeParameter => "template_type_parameter",
            Self::TemplateValueParameter => "template_value_parameter",
            Self::ThrownType => "thrown_type",
            Self::TryBlock => "try_block",
            Self::VariantPart => "variant_part",
            Self::Variable => "variable",
            Self::VolatileType => "volatile_type",
            Self::DwarfProcedure => "dwarf_procedure",
            Self::RestrictType => "restrict_type",
            Self::InterfaceType => "interface_type",
            Self::Namespace => "namespace",
            Self::ImportedModule => "imported_module",
            Self::UnspecifiedType => "unspecified_type",
            Self::PartialUnit => "partial_unit",
            Self::ImportedUnit => "imported_unit",
            Self::Condition => "condition",
            Self::SharedType => "shared_type",
            Self::TypeUnit => "type_unit",
            Self::RvalueReferenceType => "rvalue_reference_type",
            Self::TemplateAlias => "template_alias",
            Self::CoarrayType => "coarray_type",
            Self::GenericSubrange => "generic_subrange",
            Self::DynamicType => "dynamic_type",
            Self::AtomicType => "atomic_type",
            Self::CallSite => "call_site",
            Self::CallSiteParameter => "call_site_parameter",
            Self::SkeletonUnit => "skeleton_unit",
            Self::ImmutableType => "immutable_type",
            Self::User(value) => return format!("user_tag_0x{value:04x}"),
            Self::Unknown(value) => return format!("unknown_tag_0x{value:04x}"),
        };
        name.to_string()
    }
}

/// This enum represents the encoding (semantic identifier) of a DIE attribute. Unregistered
/// values are preserved in [AttributeEncoding::Unknown].
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub enum AttributeEncoding {
    Sibling,
    Location,
    Name,
    Ordering,
    ByteSize,
    BitOffset,
    BitSize,
    StmtList,
    LowPc,
    HighPc,
    Language,
    Discr,
    DiscrValue,
    Visibility,
    Import,
    StringLength,
    CommonReference,
    CompDir,
    ConstValue,
    ContainingType,
    DefaultValue,
    Inline,
    IsOptional,
    LowerBound,
    Producer,
    Prototyped,
    ReturnAddr,
    StartScope,
    BitStride,
    UpperBound,
    AbstractOrigin,
    Accessibility,
    AddressClass,
    Artificial,
    BaseTypes,
    CallingConvention,
    Count,
    DataMemberLocation,
    DeclColumn,
    DeclFile,
    DeclLine,
    Declaration,
    DiscrList,
    Encoding,
    External,
    FrameBase,
    Friend,
    IdentifierCase,
    MacroInfo,
    NamelistItem,
    Priority,
    Segment,
    Specification,
    StaticLink,
    Type,
    UseLocation,
    VariableParameter,
    Virtuality,
    VtableElemLocation,
    Allocated,
    Associated,
    DataLocation,
    ByteStride,
    EntryPc,
    UseUtf8,
    Extension,
    Ranges,
    Trampoline,
    CallColumn,
    CallFile,
    CallLine,
    Description,
    BinaryScale,
    DecimalScale,
    Small,
    DecimalSign,
    DigitCount,
    PictureString,
    Mutable,
    ThreadsScaled,
    Explicit,
    ObjectPointer,
    Endianity,
    Elemental,
    Pure,
    Recursive,
    Signature,
    MainSubprogram,
    DataBitOffset,
    ConstExpr,
    EnumClass,
    LinkageName,
    StrOffsetsBase,
    AddrBase,
    RnglistsBase,
    DwoName,
    Reference,
    RvalueReference,
    Macros,
    Noreturn,
    Alignment,
    ExportSymbols,
    Deleted,
    Defaulted,
    LoclistsBase,
    Unknown(u64),
}

impl From<u64> for AttributeEncoding {
    fn from(value: u64) -> Self {
        match value {
            0x01 => Self::Sibling,
            0x02 => Self::Location,
            0x03 => Self::Name,
            0x09 => Self::Ordering,
            0x0B => Self::ByteSize,
            0x0C => Self::BitOffset,
            0x0D => Self::BitSize,
            0x10 => Self::StmtList,
            0x11 => Self::LowPc,
            0x12 => Self::HighPc,
            0x13 => Self::Language,
            0x15 => Self::Discr,
            0x16 => Self::DiscrValue,
            0x17 => Self::Visibility,
            0x18 => Self::Import,
            0x19 => Self::StringLength,
            0x1A => Self::CommonReference,
            0x1B => Self::CompDir,
            0x1C => Self::ConstValue,
            0x1D => Self::ContainingType,
            0x1E => Self::DefaultValue,
            0x20 => Self::Inline,
            0x21 => Self::IsOptional,
            0x22 => Self::LowerBound,
            0x25 => Self::Producer,
            0x27 => Self::Prototyped,
            0x2A => Self::ReturnAddr,
            0x2C => Self::StartScope,
            0x2E => Self::BitStride,
            0x2F => Self::UpperBound,
            0x31 => Self::AbstractOrigin,
            0x32 => Self::Accessibility,
            0x33 => Self::AddressClass,
            0x34 => Self::Artificial,
            0x35 => Self::BaseTypes,
            0x36 => Self::CallingConvention,
            0x37 => Self::Count,
            0x38 => Self::DataMemberLocation,
            0x39 => Self::DeclColumn,
            0x3A => Self::DeclFile,
            0x3B => Self::DeclLine,
            0x3C => Self::Declaration,
            0x3D => Self::DiscrList,
            0x3E => Self::Encoding,
            0x3F => Self::External,
            0x40 => Self::FrameBase,
            0x41 => Self::Friend,
            0x42 => Self::IdentifierCase,
            0x43 => Self::MacroInfo,
            0x44 => Self::NamelistItem,
            0x45 => Self::Priority,
            0x46 => Self::Segment,
            0x47 => Self::Specification,
            0x48 => Self::StaticLink,
            0x49 => Self::Type,
            0x4A => Self::UseLocation,
            0x4B => Self::VariableParameter,
            0x4C => Self::Virtuality,
            0x4D => Self::VtableElemLocation,
            0x4E => Self::Allocated,
            0x4F => Self::Associated,
            0x50 => Self::DataLocation,
            0x51 => Self::ByteStride,
            0x52 => Self::EntryPc,
            0x53 => Self::UseUtf8,
            0x54 => Self::Extension,
            0x55 => Self::Ranges,
            0x56 => Self::Trampoline,
            0x57 => Self::CallColumn,
            0x58 => Self::CallFile,
            0x59 => Self::CallLine,
            0x5A => Self::Description,
            0x5B => Self::BinaryScale,
            0x5C => Self::DecimalScale,
            0x5D => Self::Small,
            0x5E => Self::DecimalSign,
            0x5F => Self::DigitCount,
            0x60 => Self::PictureString,
            0x61 => Self::Mutable,
            0x62 => Self::ThreadsScaled,
            0x63 => Self::Explicit,
            0x64 => Self::ObjectPointer,
            0x65 => Self::Endianity,
            0x66 => Self::Elemental,
            0x67 => Self::Pure,
            0x68 => Self::Recursive,
            0x69 => Self::Signature,
            0x6A => Self::MainSubprogram,
            0x6B => Self::DataBitOffset,
            0x6C => Self::ConstExpr,
            0x6D => Self::EnumClass,
            0x6E => Self::LinkageName,
            0x72 => Self::StrOffsetsBase,
            0x73 => Self::AddrBase,
            0x74 => Self::RnglistsBase,
            0x76 => Self::DwoName,
            0x77 => Self::Reference,
            0x78 => Self::RvalueReference,
            0x79 => Self::Macros,
            0x87 => Self::Noreturn,
            0x88 => Self::Alignment,
            0x89 => Self::ExportSymbols,
            0x8A => Self::Deleted,
            0x8B => Self::Defaulted,
            0x8C => Self::LoclistsBase,
            value => Self::Unknown(value),
        }
    }
}

impl AttributeEncoding {
    /// This function returns the short name of the encoding, the `DW_AT_` prefix stripped.
    /// These names are the attribute keys of the resolved type records.
    pub fn name(&self) -> String {
        let name = match self {
            Self::Sibling => "sibling",
            Self::Location => "location",
            Self::Name => "name",
            Self::Ordering => "ordering",
            Self::ByteSize => "byte_size",
            Self::BitOffset => "bit_offset",
            Self::BitSize => "bit_size",
            Self::StmtList => "stmt_list",
            Self::LowPc => "low_pc",
            Self::HighPc => "high_pc",
            Self::Language => "language",
            Self::Discr => "discr",
            Self::DiscrValue => "discr_value",
            Self::Visibility => "visibility",
            Self::Import => "import",
            Self::StringLength => "string_length",
            Self::CommonReference => "common_reference",
            Self::CompDir => "comp_dir",
            Self::ConstValue => "const_value",
            Self::ContainingType => "containing_type",
            Self::DefaultValue => "default_value",
            Self::Inline => "inline",
            Self::IsOptional => "is_optional",
            Self::LowerBound => "lower_bound",
            Self::Producer => "producer",
            Self::Prototyped => "prototyped",
            Self::ReturnAddr => "return_addr",
            Self::StartScope => "start_scope",
            Self::BitStride => "bit_stride",
            Self::UpperBound => "upper_bound",
            Self::AbstractOrigin => "abstract_origin",
            Self::Accessibility => "accessibility",
            Self::AddressClass => "address_class",
            Self::Artificial => "artificial",
            Self::BaseTypes => "base_types",
            Self::CallingConvention => "calling_convention",
            Self::Count => "count",
            Self::DataMemberLocation => "data_member_location",
            Self::DeclColumn => "decl_column",
            Self::DeclFile => "decl_file",
            Self::DeclLine => "decl_line",
            Self::Declaration => "declaration",
            Self::DiscrList => "discr_list",
            Self::Encoding => "encoding",
            Self::External => "external",
            Self::FrameBase => "frame_base",
            Self::Friend => "friend",
            Self::IdentifierCase => "identifier_case",
            Self::MacroInfo => "macro_info",
            Self::NamelistItem => "namelist_item",
            Self::Priority => "priority",
            Self::Segment => "segment",
            Self::Specification => "specification",
            Self::StaticLink => "static_link",
            Self::Type => "type",
            Self::UseLocation => "use_location",
            Self::VariableParameter => "variable_parameter",
            Self::Virtuality => "virtuality",
            Self::VtableElemLocation => "vtable_elem_location",
            Self::Allocated => "allocated",
            Self::Associated => "associated",
            Self::DataLocation => "data_location",
            Self::ByteStride => "byte_stride",
            Self::EntryPc => "entry_pc",
            Self::UseUtf8 => "use_UTF8",
            Self::Extension => "extension",
            Self::Ranges => "ranges",
            Self::Trampoline => "trampoline",
            Self::CallColumn => "call_column",
            Self::CallFile => "call_file",
            Self::CallLine => "call_line",
            Self::Description => "description",
            Self::BinaryScale => "binary_scale",
            Self::DecimalScale => "decimal_scale",
            Self::Small => "small",
            Self::DecimalSign => "decimal_sign",
            Self::DigitCount => "digit_count",
            Self::PictureString => "picture_string",
            Self::Mutable => "mutable",
            Self::ThreadsScaled => "threads_scaled",
            Self::Explicit => "explicit",
            Self::ObjectPointer => "object_pointer",
            Self::Endianity => "endianity",
            Self::Elemental => "elemental",
            Self::Pure => "pure",
            Self::Recursive => "recursive",
            Self::Signature => "signature",
            Self::MainSubprogram => "main_subprogram",
            Self::DataBitOffset => "data_bit_offset",
            Self::ConstExpr => "const_expr",
            Self::EnumClass => "enum_class",
            Self::LinkageName => "linkage_name",
            Self::StrOffsetsBase => "str_offsets_base",
            Self::AddrBase => "addr_base",
            Self::RnglistsBase => "rnglists_base",
            Self::DwoName => "dwo_name",
            Self::Reference => "reference",
            Self::RvalueReference => "rvalue_reference",
            Self::Macros => "macros",
            Self::Noreturn => "noreturn",
            Self::Alignment => "alignment",
            Self::ExportSymbols => "export_symbols",
            Self::Deleted => "deleted",
            Self::Defaulted => "defaulted",
            Self::LoclistsBase => "loclists_base",
            Self::Unknown(value) => return format!("unknown_attribute_0x{value:04x}"),
        };
        name.to_string()
    }
}

/// This enum represents the form (wire representation) of a DIE attribute value. Unregistered
/// values are preserved in [AttributeForm::Unknown]; readers reject them with a typed error
/// when they have to decode a value of that form.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub enum AttributeForm {
    Addr,
    Block2,
    Block4,
    Data2,
    Data4,
    Data8,
    String,
    Block,
    Block1,
    Data1,
    Flag,
    Sdata,
    Strp,
    Udata,
    RefAddr,
    Ref1,
    Ref2,
    Ref4,
    Ref8,
    RefUdata,
    Indirect,
    SecOffset,
    Exprloc,
    FlagPresent,
    LineStrp,
    RefSig8,
    ImplicitConst,
    Unknown(u64),
}

impl From<u64> for AttributeForm {
    fn from(value: u64) -> Self {
        match value {
            0x01 => Self::Addr,
            0x03 => Self::Block2,
            0x04 => Self::Block4,
            0x05 => Self::Data2,
            0x06 => Self::Data4,
            0x07 => Self::Data8,
            0x08 => Self::String,
            0x09 => Self::Block,
            0x0A => Self::Block1,
            0x0B => Self::Data1,
            0x0C => Self::Flag,
            0x0D => Self::Sdata,
            0x0E => Self::Strp,
            0x0F => Self::Udata,
            0x10 => Self::RefAddr,
            0x11 => Self::Ref1,
            0x12 => Self::Ref2,
            0x13 => Self::Ref4,
            0x14 => Self::Ref8,
            0x15 => Self::RefUdata,
            0x16 => Self::Indirect,
            0x17 => Self::SecOffset,
            0x18 => Self::Exprloc,
            0x19 => Self::FlagPresent,
            0x1F => Self::LineStrp,
            0x20 => Self::RefSig8,
            0x21 => Self::ImplicitConst,
            value => Self::Unknown(value),
        }
    }
}

impl AttributeForm {
    /// This function indicates whether a reference of this form is relative to the start of its
    /// compilation unit. Such references are adjusted by the CU start offset when they are
    /// followed; `ref_addr` and `ref_sig8` are absolute and are not.
    #[inline]
    pub fn is_cu_relative(&self) -> bool {
        matches!(
            self,
            Self::Ref1 | Self::Ref2 | Self::Ref4 | Self::Ref8 | Self::RefUdata
        )
    }
}

/// This function converts the numeric value of an enumerated attribute into its named
/// enumerator, e.g. language code 0x0C into `C99`. Encodings without an enumerated
/// representation and unregistered values yield none and keep their numeric value.
pub fn encoding_repr(encoding: AttributeEncoding, value: u64) -> Option<&'static str> {
    match encoding {
        AttributeEncoding::Language => language_name(value),
        AttributeEncoding::Encoding => base_type_encoding_name(value),
        AttributeEncoding::DecimalSign => decimal_sign_name(value),
        AttributeEncoding::Endianity => endianity_name(value),
        AttributeEncoding::Accessibility => accessibility_name(value),
        AttributeEncoding::Visibility => visibility_name(value),
        AttributeEncoding::Virtuality => virtuality_name(value),
        AttributeEncoding::IdentifierCase => identifier_case_name(value),
        AttributeEncoding::CallingConvention => calling_convention_name(value),
        AttributeEncoding::Inline => inline_name(value),
        AttributeEncoding::Ordering => ordering_name(value),
        AttributeEncoding::Discr | AttributeEncoding::DiscrValue | AttributeEncoding::DiscrList => {
            discriminant_name(value)
        }
        AttributeEncoding::Defaulted => defaulted_name(value),
        _ => None,
    }
}

fn language_name(value: u64) -> Option<&'static str> {
    Some(match value {
        0x0001 => "C89",
        0x0002 => "C",
        0x0003 => "Ada83",
        0x0004 => "C_plus_plus",
        0x0005 => "Cobol74",
        0x0006 => "Cobol85",
        0x0007 => "Fortran77",
        0x0008 => "Fortran90",
        0x0009 => "Pascal83",
        0x000A => "Modula2",
        0x000B => "Java",
        0x000C => "C99",
        0x000D => "Ada95",
        0x000E => "Fortran95",
        0x000F => "PLI",
        0x0010 => "ObjC",
        0x0011 => "ObjC_plus_plus",
        0x0012 => "UPC",
        0x0013 => "D",
        0x0014 => "Python",
        0x0015 => "OpenCL",
        0x0016 => "Go",
        0x0017 => "Modula3",
        0x0018 => "Haskell",
        0x0019 => "C_plus_plus_03",
        0x001A => "C_plus_plus_11",
        0x001B => "OCaml",
        0x001C => "Rust",
        0x001D => "C11",
        0x001E => "Swift",
        0x001F => "Julia",
        0x0020 => "Dylan",
        0x0021 => "C_plus_plus_14",
        0x0022 => "Fortran03",
        0x0023 => "Fortran08",
        0x0024 => "RenderScript",
        0x0025 => "BLISS",
        _ => return None,
    })
}

fn base_type_encoding_name(value: u64) -> Option<&'static str> {
    Some(match value {
        0x01 => "address",
        0x02 => "boolean",
        0x03 => "complex_float",
        0x04 => "float",
        0x05 => "signed",
        0x06 => "signed_char",
        0x07 => "unsigned",
        0x08 => "unsigned_char",
        0x09 => "imaginary_float",
        0x0A => "packed_decimal",
        0x0B => "numeric_string",
        0x0C => "edited",
        0x0D => "signed_fixed",
        0x0E => "unsigned_fixed",
        0x0F => "decimal_float",
        0x10 => "UTF",
        0x11 => "UCS",
        0x12 => "ASCII",
        _ => return None,
    })
}

fn decimal_sign_name(value: u64) -> Option<&'static str> {
    Some(match value {
        0x01 => "unsigned",
        0x02 => "leading_overpunch",
        0x03 => "trailing_overpunch",
        0x04 => "leading_separate",
        0x05 => "trailing_separate",
        _ => return None,
    })
}

fn endianity_name(value: u64) -> Option<&'static str> {
    Some(match value {
        0x00 => "default",
        0x01 => "big",
        0x02 => "little",
        _ => return None,
    })
}

fn accessibility_name(value: u64) -> Option<&'static str> {
    Some(match value {
        0x01 => "public",
        0x02 => "protected",
        0x03 => "private",
        _ => return None,
    })
}

fn visibility_name(value: u64) -> Option<&'static str> {
    Some(match value {
        0x01 => "local",
        0x02 => "exported",
        0x03 => "qualified",
        _ => return None,
    })
}

fn virtuality_name(value: u64) -> Option<&'static str> {
    Some(match value {
        0x00 => "none",
        0x01 => "virtual",
        0x02 => "pure_virtual",
        _ => return None,
    })
}

fn identifier_case_name(value: u64) -> Option<&'static str> {
    Some(match value {
        0x00 => "case_sensitive",
        0x01 => "up_case",
        0x02 => "down_case",
        0x03 => "case_insensitive",
        _ => return None,
    })
}

fn calling_convention_name(value: u64) -> Option<&'static str> {
    Some(match value {
        0x01 => "normal",
        0x02 => "program",
        0x03 => "nocall",
        0x04 => "pass_by_reference",
        0x05 => "pass_by_value",
        _ => return None,
    })
}

fn inline_name(value: u64) -> Option<&'static str> {
    Some(match value {
        0x00 => "not_inlined",
        0x01 => "inlined",
        0x02 => "declared_not_inlined",
        0x03 => "declared_inlined",
        _ => return None,
    })
}

fn ordering_name(value: u64) -> Option<&'static str> {
    Some(match value {
        0x00 => "row_major",
        0x01 => "col_major",
        _ => return None,
    })
}

fn discriminant_name(value: u64) -> Option<&'static str> {
    Some(match value {
        0x00 => "label",
        0x01 => "range",
        _ => return None,
    })
}

fn defaulted_name(value: u64) -> Option<&'static str> {
    Some(match value {
        0x00 => "no",
        0x01 => "in_class",
        0x02 => "out_of_class",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_mapping_round_trips_known_values() {
        assert_eq!(Tag::from(0x11), Tag::CompileUnit);
        assert_eq!(Tag::from(0x24), Tag::BaseType);
        assert_eq!(Tag::from(0x4080), Tag::User(0x4080));
        assert_eq!(Tag::from(0x5000_0000), Tag::Unknown(0x5000_0000));
    }

    #[test]
    fn attribute_names_match_the_resolved_record_keys() {
        assert_eq!(AttributeEncoding::from(0x49).name(), "type");
        assert_eq!(AttributeEncoding::from(0x3A).name(), "decl_file");
        assert_eq!(AttributeEncoding::from(0x38).name(), "data_member_location");
    }

    #[test]
    fn cu_relative_forms_are_exactly_the_ref_n_family() {
        assert!(AttributeForm::Ref4.is_cu_relative());
        assert!(AttributeForm::RefUdata.is_cu_relative());
        assert!(!AttributeForm::RefAddr.is_cu_relative());
        assert!(!AttributeForm::RefSig8.is_cu_relative());
    }

    #[test]
    fn enumerated_representations_resolve() {
        assert_eq!(encoding_repr(AttributeEncoding::Language, 0x1C), Some("Rust"));
        assert_eq!(encoding_repr(AttributeEncoding::Encoding, 0x05), Some("signed"));
        assert_eq!(encoding_repr(AttributeEncoding::Inline, 0x03), Some("declared_inlined"));
        assert_eq!(encoding_repr(AttributeEncoding::ByteSize, 4), None);
    }
}
