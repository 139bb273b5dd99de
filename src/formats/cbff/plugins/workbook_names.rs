//! Static BIFF record names: (record type, short name, long name).

use once_cell::sync::Lazy;
use std::collections::HashMap;

static RECORD_NAMES: &[(u16, &str, &str)] = &[
    (0x0009, "BOF", "Beginning of File"),
    (0x000a, "EOF", "End of File"),
    (0x000c, "CALCCOUNT", "Iteration Count"),
    (0x000d, "CALCMODE", "Calculation Mode"),
    (0x000e, "PRECISION", "Precision"),
    (0x000f, "REFMODE", "Reference Mode"),
    (0x0010, "DELTA", "Iteration Increment"),
    (0x0011, "ITERATION", "Iteration Mode"),
    (0x0012, "PROTECT", "Protection Flag"),
    (0x0013, "PASSWORD", "Protection Password"),
    (0x0014, "HEADER", "Print Header on Each Page"),
    (0x0015, "FOOTER", "Print Footer on Each Page"),
    (0x0016, "EXTERNCOUNT", "Number of External References"),
    (0x0017, "EXTERNSHEET", "External Reference"),
    (0x0019, "WINDOWPROTECT", "Windows Are Protected"),
    (0x001a, "VERTICALPAGEBREAKS", "Explicit Column Page Breaks"),
    (0x001b, "HORIZONTALPAGEBREAKS", "Explicit Row Page Breaks"),
    (0x001c, "NOTE", "Comment Associated with a Cell"),
    (0x001d, "SELECTION", "Current Selection"),
    (0x0022, "1904", "1904 Date System"),
    (0x0026, "LEFTMARGIN", "Left Margin Measurement"),
    (0x0027, "RIGHTMARGIN", "Right Margin Measurement"),
    (0x0028, "TOPMARGIN", "Top Margin Measurement"),
    (0x0029, "BOTTOMMARGIN", "Bottom Margin Measurement"),
    (0x002a, "PRINTHEADERS", "Print Row/Column Labels"),
    (0x002b, "PRINTGRIDLINES", "Print Gridlines Flag"),
    (0x002f, "FILEPASS", "File Is Password-Protected"),
    (0x0031, "UFONT", "Unicode Font"),
    (0x003c, "CONTINUE", "Continues Long Records"),
    (0x003d, "WINDOW1", "Window Information"),
    (0x0040, "BACKUP", "Save Backup Version of the File"),
    (0x0041, "PANE", "Number of Panes and Their Position"),
    (0x0042, "CODENAME / CODEPAGE", "VBE Object Name / Default Code Page"),
    (0x004d, "PLS", "Environment-Specific Print Record"),
    (0x0050, "DCON", "Data Consolidation Information"),
    (0x0051, "DCONREF", "Data Consolidation References"),
    (0x0052, "DCONNAME", "Data Consolidation Named References"),
    (0x0055, "DEFCOLWIDTH", "Default Width for Columns"),
    (0x0059, "XCT", "CRN Record Count"),
    (0x005a, "CRN", "Nonresident Operands"),
    (0x005b, "FILESHARING", "File-Sharing Information"),
    (0x005c, "WRITEACCESS", "Write Access User Name"),
    (0x005d, "OBJ", "Describes a Graphic Object"),
    (0x005e, "UNCALCED", "Recalculation Status"),
    (0x005f, "SAVERECALC", "Recalculate Before Save"),
    (0x0060, "TEMPLATE", "Workbook Is a Template"),
    (0x0063, "OBJPROTECT", "Objects Are Protected"),
    (0x007d, "COLINFO", "Column Formatting Information"),
    (0x007e, "RK", "Cell Value, RK Number"),
    (0x007f, "IMDATA", "Image Data"),
    (0x0080, "GUTS", "Size of Row and Column Gutters"),
    (0x0081, "WSBOOL", "Additional Workspace Information"),
    (0x0082, "GRIDSET", "State Change of Gridlines Option"),
    (0x0083, "HCENTER", "Center Between Horizontal Margins"),
    (0x0084, "VCENTER", "Center Between Vertical Margins"),
    (0x0085, "BOUNDSHEET", "Sheet Information"),
    (0x0086, "WRITEPROT", "Workbook Is Write-Protected"),
    (0x0087, "ADDIN", "Workbook Is an Add-in Macro"),
    (0x0088, "EDG", "Edition Globals"),
    (0x0089, "PUB", "Publisher"),
    (0x008c, "COUNTRY", "Default Country and WIN.INI Country"),
    (0x008d, "HIDEOBJ", "Object Display Options"),
    (0x0090, "SORT", "Sorting Options"),
    (0x0091, "SUB", "Subscriber"),
    (0x0092, "PALETTE", "Color Palette Definition"),
    (0x0094, "LHRECORD", ".WK? File Conversion Information"),
    (0x0095, "LHNGRAPH", "Named Graph Information"),
    (0x0096, "SOUND", "Sound Note"),
    (0x0098, "LPR", "Sheet Was Printed Using LINE.PRINT("),
    (0x0099, "STANDARDWIDTH", "Standard Column Widt"),
    (0x009b, "FILTERMODE", "Sheet Contains Filtered List"),
    (0x009c, "FNGROUPCOUNT", "Built-in Function Group Count"),
    (0x009d, "AUTOFILTERINFO", "Drop-Down Arrow Count"),
    (0x009e, "AUTOFILTER", "AutoFilter Data"),
    (0x00a0, "SCL", "Window Zoom Magnification"),
    (0x00a1, "SETUP", "Page Setup"),
    (0x00a9, "COORDLIST", "Polygon Object Vertex Coordinates"),
    (0x00ab, "GCW", "Global Column-Width Flags"),
    (0x00ae, "SCENMAN", "Scenario Output Data"),
    (0x00af, "SCENARIO", "Scenario Data"),
    (0x00b0, "SXVIEW", "View Definition"),
    (0x00b1, "SXVD", "View Fields"),
    (0x00b2, "SXVI", "View Item"),
    (0x00b4, "SXIVD", "Row/Column Field IDs"),
    (0x00b5, "SXLI", "Line Item Array"),
    (0x00b6, "SXPI", "Page Item"),
    (0x00b8, "DOCROUTE", "Routing Slip Information"),
    (0x00b9, "RECIPNAME", "Recipient Name"),
    (0x00bc, "SHRFMLA", "Shared Formula"),
    (0x00bd, "MULRK", "Multiple RK Cells"),
    (0x00be, "MULBLANK", "Multiple Blank Cells"),
    (0x00c1, "MMS", "ADDMENU/DELMENU Record Group Count"),
    (0x00c2, "ADDMENU", "Menu Addition"),
    (0x00c3, "DELMENU", "Menu Deletion"),
    (0x00c5, "SXDI", "Data Item"),
    (0x00c6, "SXDB", "PivotTable Cache Data"),
    (0x00cd, "SXSTRING", "String"),
    (0x00d0, "SXTBL", "Multiple Consolidation Source Info"),
    (0x00d1, "SXTBRGIITM", "Page Item Name Count"),
    (0x00d2, "SXTBPG", "Page Item Indexes"),
    (0x00d3, "OBPROJ", "Visual Basic Project"),
    (0x00d5, "SXIDSTM", "Stream ID"),
    (0x00d6, "RSTRING", "Cell with Character Formatting"),
    (0x00d7, "DBCELL", "Stream Offsets"),
    (0x00da, "BOOKBOOL", "Workbook Option Flag"),
    (0x00dc, "PARAMQRY / SXEXT", "Query Parameters / External Source Information"),
    (0x00dd, "SCENPROTECT", "Scenario Protection"),
    (0x00de, "OLESIZE", "Size of OLE Object"),
    (0x00df, "UDDESC", "Description String for Chart Autoformat"),
    (0x00e0, "XF", "Extended Format"),
    (0x00e1, "INTERFACEHDR", "Beginning of User Interface Records"),
    (0x00e2, "INTERFACEEND", "End of User Interface Records"),
    (0x00e3, "SXVS", "View Source"),
    (0x00e5, "MERGECELLS", "Merged Cells"),
    (0x00ea, "TABIDCONF", "Sheet Tab ID of Conflict History"),
    (0x00eb, "MSODRAWINGGROUP", "Microsoft Office Drawing Group"),
    (0x00ec, "MSODRAWING", "Microsoft Office Drawing"),
    (0x00ed, "MSODRAWINGSELECTION", "Microsoft Office Drawing Selection"),
    (0x00f0, "SXRULE", "PivotTable Rule Data"),
    (0x00f1, "SXEX", "PivotTable View Extended Information"),
    (0x00f2, "SXFILT", "PivotTable Rule Filter"),
    (0x00f4, "SXDXF", "Pivot Table Formatting"),
    (0x00f5, "SXITM", "Pivot Table Item Indexes"),
    (0x00f6, "SXNAME", "PivotTable Name"),
    (0x00f7, "SXSELECT", "PivotTable Selection Information"),
    (0x00f8, "SXPAIR", "PivotTable Name Pair"),
    (0x00f9, "SXFMLA", "Pivot Table Parsed Expression"),
    (0x00fb, "SXFORMAT", "PivotTable Format Record"),
    (0x00fc, "SST", "Shared String Table"),
    (0x00fd, "LABELSST", "Cell Value, String Constant/SST"),
    (0x00ff, "EXTSST", "Extended Shared String Table"),
    (0x0100, "SXVDEX", "Extended PivotTable View Fields"),
    (0x0103, "SXFORMULA", "PivotTable Formula Record"),
    (0x0122, "SXDBEX", "PivotTable Cache Data"),
    (0x013d, "TABID", "Sheet Tab Index Array"),
    (0x0160, "USESELFS", "Natural Language Formulas Flag"),
    (0x0161, "DSF", "Double Stream File"),
    (0x0162, "XL5MODIFY", "Flag for DSF"),
    (0x01a5, "FILESHARING2", "File-Sharing Information for Shared Lists"),
    (0x01a9, "USERBVIEW", "Workbook Custom View Settings"),
    (0x01aa, "USERSVIEWBEGIN", "Custom View Settings"),
    (0x01ab, "USERSVIEWEND", "End of Custom View Records"),
    (0x01ad, "QSI", "External Data Range"),
    (0x01ae, "SUPBOOK", "Supporting Workbook"),
    (0x01af, "PROT4REV", "Shared Workbook Protection Flag"),
    (0x01b0, "CONDFMT", "Conditional Formatting Range Information"),
    (0x01b1, "CF", "Conditional Formatting Conditions"),
    (0x01b2, "DVAL", "Data Validation Information"),
    (0x01b5, "DCONBIN", "Data Consolidation Information"),
    (0x01b6, "TXO", "Text Object"),
    (0x01b7, "REFRESHALL", "Refresh Flag"),
    (0x01b8, "HLINK", "Hyperlink"),
    (0x01bb, "SXFDBTYPE", "SQL Datatype Identifier"),
    (0x01bc, "PROT4REVPASS", "Shared Workbook Protection Password"),
    (0x01be, "DV", "Data Validation Criteria"),
    (0x01c0, "EXCEL9FILE", "Excel 9 File"),
    (0x01c1, "RECALCID", "Recalc Information"),
    (0x0200, "DIMENSIONS", "Cell Table Size"),
    (0x0201, "BLANK", "Cell Value, Blank Cell"),
    (0x0203, "NUMBER", "Cell Value, Floating-Point Number"),
    (0x0204, "LABEL", "Cell Value, String Constant"),
    (0x0205, "BOOLERR", "Cell Value, Boolean or Error"),
    (0x0207, "STRING", "String Value of a Formula"),
    (0x0208, "ROW", "Describes a Row"),
    (0x0209, "BOF", "Beginning of File"),
    (0x020b, "INDEX", "Index Record"),
    (0x0218, "NAME", "Defined Name"),
    (0x0221, "ARRAY", "Array-Entered Formula"),
    (0x0223, "EXTERNNAME", "Externally Referenced Name"),
    (0x0225, "DEFAULTROWHEIGHT", "Default Row Height"),
    (0x0231, "FONT", "Font Description"),
    (0x0236, "TABLE", "Data Table"),
    (0x023e, "WINDOW2", "Sheet Window Information"),
    (0x027e, "RK", "Cell Value, RK Number"),
    (0x0293, "STYLE", "Style Information"),
    (0x0406, "FORMULA", "Cell Formula"),
    (0x0409, "BOF", "Beginning of File"),
    (0x041e, "FORMAT", "Number Format"),
    (0x0800, "HLINKTOOLTIP", "Hyperlink Tooltip"),
    (0x0801, "WEBPUB", "Web Publish Item"),
    (0x0802, "QSISXTAG", "PivotTable and Query Table Extensions"),
    (0x0803, "DBQUERYEXT", "Database Query Extensions"),
    (0x0804, "EXTSTRING", "FRT String"),
    (0x0805, "TXTQUERY", "Text Query Information"),
    (0x0806, "QSIR", "Query Table Formatting"),
    (0x0807, "QSIF", "Query Table Field Formatting"),
    (0x0809, "BOF", "Beginning of File"),
    (0x080a, "OLEDBCONN", "OLE Database Connection"),
    (0x080b, "WOPT", "Web Options"),
    (0x080c, "SXVIEWEX", "Pivot Table OLAP Extensions"),
    (0x080d, "SXTH", "PivotTable OLAP Hierarchy"),
    (0x080e, "SXPIEX", "OLAP Page Item Extensions"),
    (0x080f, "SXVDTEX", "View Dimension OLAP Extensions"),
    (0x0810, "SXVIEWEX9", "Pivot Table Extensions"),
    (0x0812, "CONTINUEFRT", "Continued FRT"),
    (0x0813, "REALTIMEDATA", "Real-Time Data (RTD)"),
    (0x0862, "SHEETEXT", "Extra Sheet Info"),
    (0x0863, "BOOKEXT", "Extra Book Info"),
    (0x0864, "SXADDL", "Pivot Table Additional Info"),
    (0x0865, "CRASHRECERR", "Crash Recovery Error"),
    (0x0866, "HFPicture", "Header / Footer Picture"),
    (0x0867, "FEATHEADR", "Shared Feature Header"),
    (0x0868, "FEAT", "Shared Feature Record"),
    (0x086a, "DATALABEXT", "Chart Data Label Extension"),
    (0x086b, "DATALABEXTCONTENTS", "Chart Data Label Extension Contents"),
    (0x086c, "CELLWATCH", "Cell Watc"),
    (0x0871, "FEATHEADR11", "Shared Feature Header 11"),
    (0x0872, "FEAT11", "Shared Feature 11 Record"),
    (0x0873, "FEATINFO11", "Shared Feature Info 11 Record"),
    (0x0874, "DROPDOWNOBJIDS", "Drop Down Object"),
    (0x0875, "CONTINUEFRT11", "Continue FRT 11"),
    (0x0876, "DCONN", "Data Connection"),
    (0x0877, "LIST12", "Extra Table Data Introduced in Excel 2007"),
    (0x0878, "FEAT12", "Shared Feature 12 Record"),
    (0x0879, "CONDFMT12", "Conditional Formatting Range Information 12"),
    (0x087a, "CF12", "Conditional Formatting Condition 12"),
    (0x087b, "CFEX", "Conditional Formatting Extension"),
    (0x087c, "XFCRC", "XF Extensions Checksum"),
    (0x087d, "XFEXT", "XF Extension"),
    (0x087e, "EZFILTER12", "AutoFilter Data Introduced in Excel 2007"),
    (0x087f, "CONTINUEFRT12", "Continue FRT 12"),
    (0x0881, "SXADDL12", "Additional Workbook Connections Information"),
    (0x0884, "MDTINFO", "Information about a Metadata Type"),
    (0x0885, "MDXSTR", "MDX Metadata String"),
    (0x0886, "MDXTUPLE", "Tuple MDX Metadata"),
    (0x0887, "MDXSET", "Set MDX Metadata"),
    (0x0888, "MDXPROP", "Member Property MDX Metadata"),
    (0x0889, "MDXKPI", "Key Performance Indicator MDX Metadata"),
    (0x088a, "MDTB", "Block of Metadata Records"),
    (0x088b, "PLV_XLS2007", "Page Layout View Settings in Excel 2007"),
    (0x088c, "COMPAT12", "Compatibility Checker 12"),
    (0x088d, "DXF", "Differential XF"),
    (0x088e, "TABLESTYLES", "Table Styles"),
    (0x088f, "TABLESTYLE", "Table Style"),
    (0x0890, "TABLESTYLEELEMENT", "Table Style Element"),
    (0x0892, "STYLEEXT", "Named Cell Style Extension"),
    (0x0893, "NAMEPUBLISH", "Publish To Excel Server Data for Name"),
    (0x0894, "NAMECMT", "Name Comment"),
    (0x0895, "SORTDATA12", "Sort Data 12"),
    (0x0896, "THEME", "Theme"),
    (0x0897, "GUIDTYPELIB", "VB Project Typelib GUID"),
    (0x0898, "FNGRP12", "Function Group"),
    (0x0899, "NAMEFNGRP12", "Extra Function Group"),
    (0x089a, "MTRSETTINGS", "Multi-Threaded Calculation Settings"),
    (0x089b, "COMPRESSPICTURES", "Automatic Picture Compression Mode"),
    (0x089c, "HEADERFOOTER", "Header Footer"),
    (0x08a3, "FORCEFULLCALCULATION", "Force Full Calculation Settings"),
    (0x08c1, "LISTOBJ", "List Object"),
    (0x08c2, "LISTFIELD", "List Field"),
    (0x08c3, "LISTDV", "List Data Validation"),
    (0x08c4, "LISTCONDFMT", "List Conditional Formatting"),
    (0x08c5, "LISTCF", "List Cell Formatting"),
    (0x08c6, "FMQRY", "Filemaker queries"),
    (0x08c7, "FMSQRY", "File maker queries"),
    (0x08c8, "PLV_MAC11", "Page Layout View in Mac Excel 11"),
    (0x08c9, "LNEXT", "Extension information for borders in Mac Office 11"),
    (0x08ca, "MKREXT", "Extension information for markers in Mac Office 11"),
    (0x08cb, "CRTCOOPT", "Color options for Chart series in Mac Office 11"),
    (0x1001, "CHUNITS", "Chart Units"),
    (0x1002, "CHCHART", "Location and Overall Chart Dimensions"),
    (0x1003, "CHSERIES", "Series Definition"),
    (0x1006, "CHDATAFORMAT", "Series and Data Point Numbers"),
    (0x1007, "CHLINEFORMAT", "Style of a Line or Border"),
    (0x1009, "CHMARKERFORMAT", "Style of a Line Marker"),
    (0x100a, "CHAREAFORMAT", "Colors and Patterns for an Area"),
    (0x100b, "CHPIEFORMAT", "Position of the Pie Slice"),
    (0x100c, "CHATTACHEDLABEL", "Series Data/Value Labels"),
    (0x100d, "CHSERIESTEXT", "Legend/Category/Value Text"),
    (0x1014, "CHCHARTFORMAT", "Parent Record for Chart Group"),
    (0x1015, "CHLEGEND", "Legend Type and Position"),
    (0x1016, "CHSERIESLIST", "Specifies the Series in an Overlay Chart"),
    (0x1017, "CHBAR", "Chart Group is a Bar or Column Chart Group"),
    (0x1018, "CHLINE", "Chart Group Is a Line Chart Group"),
    (0x1019, "CHPIE", "Chart Group Is a Pie Chart Group"),
    (0x101a, "CHAREA", "Chart Group Is an Area Chart Group"),
    (0x101b, "CHSCATTER", "Chart Group Is a Scatter Chart Group"),
    (0x101c, "CHCHARTLINE", "Drop/Hi-Lo/Series Lines on a Line Chart"),
    (0x101d, "CHAXIS", "Axis Type"),
    (0x101e, "CHTICK", "Tick Marks and Labels Format"),
    (0x101f, "CHVALUERANGE", "Defines Value Axis Scale"),
    (0x1020, "CHCATSERRANGE", "Defines a Category or Series Axis"),
    (0x1021, "CHAXISLINEFORMAT", "Defines a Line That Spans an Axis"),
    (0x1022, "CHCHARTFORMATLINK", "Not Used"),
    (0x1024, "CHDEFAULTTEXT", "Default Data Label Text Properties"),
    (0x1025, "CHTEXT", "Defines Display of Text Fields"),
    (0x1026, "CHFONTX", "Font Index"),
    (0x1027, "CHOBJECTLINK", "Attaches Text to Chart or to Chart Item"),
    (0x1032, "CHFRAME", "Defines Border Shape Around Displayed Text"),
    (0x1033, "CHBEGIN", "Defines the Beginning of an Object"),
    (0x1034, "CHEND", "Defines the End of an Object"),
    (0x1035, "CHPLOTAREA", "Frame Belongs to Plot Area "),
    (0x103a, "CH3D", "Chart Group Is a 3-D Chart Group"),
    (0x103c, "CHPICF", "Picture Format"),
    (0x103d, "CHDROPBAR", "Defines Drop Bars"),
    (0x103e, "CHRADAR", "Chart Group Is a Radar Chart Group"),
    (0x103f, "CHSURFACE", "Chart Group Is a Surface Chart Group"),
    (0x1040, "CHRADARAREA", "Chart Group Is a Radar Area Chart Group"),
    (0x1041, "CHAXISPARENT", "Axis Size and Location"),
    (0x1043, "CHLEGENDXN", "Legend Exception"),
    (0x1044, "CHSHTPROPS", "Sheet Properties"),
    (0x1045, "CHSERTOCRT", "Series Chart-Group Index"),
    (0x1046, "CHAXESUSED", "Number of Axes Sets"),
    (0x1048, "CHSBASEREF", "PivotTable Reference"),
    (0x104a, "CHSERPARENT", "Trendline or ErrorBar Series Index"),
    (0x104b, "CHSERAUXTREND", "Series Trendline"),
    (0x104e, "CHIFMT", "Number-Format Index"),
    (0x104f, "CHPOS", "Position Information"),
    (0x1050, "CHALRUNS", "Text Formatting"),
    (0x1051, "CHAI", "Linked Data"),
    (0x105b, "CHSERAUXERRBAR", "Series ErrorBar"),
    (0x105d, "CHSERFMT", "Series Format"),
    (0x1060, "CHFBI", "Font Basis"),
    (0x1061, "CHBOPPOP", "Bar of Pie/Pie of Pie Chart Options"),
    (0x1062, "CHAXCEXT", "Axis Options"),
    (0x1063, "CHDAT", "Data Table Options"),
    (0x1064, "CHPLOTGROWTH", "Font Scale Factors"),
    (0x1065, "CHSIINDEX", "Series Index"),
    (0x1066, "CHGELFRAME", "Fill Data"),
    (0x1067, "CHBOPPOPCUSTOM", "Custom Bar of Pie/Pie of Pie Chart Options"),
];

static BY_TYPE: Lazy<HashMap<u16, (&'static str, &'static str)>> = Lazy::new(|| {
    RECORD_NAMES
        .iter()
        .map(|&(ty, short, long)| (ty, (short, long)))
        .collect()
});

/// Short mnemonic, `UNKNOWN` when the type is not listed.
pub fn short_name(record_type: u16) -> &'static str {
    BY_TYPE.get(&record_type).map_or("UNKNOWN", |n| n.0)
}

pub fn long_name(record_type: u16) -> &'static str {
    BY_TYPE.get(&record_type).map_or("Unknown", |n| n.1)
}

/// Substream type carried by a BOF record.
pub fn bof_type_name(dt: u16) -> &'static str {
    match dt {
        0x0005 => "Workbook globals",
        0x0006 => "Visual Basic module",
        0x0010 => "Worksheet or dialog sheet",
        0x0020 => "Chart",
        0x0040 => "Excel 4.0 macro sheet",
        0x0100 => "Workspace file",
        _ => "Unknown",
    }
}
